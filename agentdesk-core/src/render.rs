//! What the page shows for a run

use crate::agent::ToolCallSummary;
use crate::runner::{EMPTY_QUERY_WARNING, NO_CONTENT_WARNING, RunFailure, RunState};

/// Displayable outcome of a submission
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// The agent's answer, verbatim
    Content {
        agent: String,
        text: String,
        /// Present when the agent shows its tool calls
        tool_calls: Option<Vec<ToolCallSummary>>,
    },
    Warning(String),
    Error(String),
}

impl Rendered {
    /// Render a runner state
    ///
    /// A runner that never left `Idle` was given blank input.
    pub fn from_state(state: &RunState, show_tool_calls: bool) -> Self {
        match state {
            RunState::Succeeded(response) => Rendered::Content {
                agent: response.agent.clone(),
                text: response.content.clone().unwrap_or_default(),
                tool_calls: show_tool_calls.then(|| response.tool_calls.clone()),
            },
            RunState::Failed(RunFailure::NoContent) => {
                Rendered::Warning(NO_CONTENT_WARNING.to_string())
            }
            RunState::Failed(RunFailure::Error(message)) => {
                Rendered::Error(format!("Error: {}", message))
            }
            RunState::Idle | RunState::Running => {
                Rendered::Warning(EMPTY_QUERY_WARNING.to_string())
            }
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Rendered::Content { .. })
    }

    /// Plain-text form for terminals
    pub fn to_plain_text(&self) -> String {
        match self {
            Rendered::Content {
                text, tool_calls, ..
            } => {
                let mut out = String::new();
                if let Some(calls) = tool_calls.as_ref().filter(|c| !c.is_empty()) {
                    for call in calls {
                        out.push_str(&format!(
                            "[tool] {}({}) {} in {}ms\n",
                            call.tool_name,
                            call.arguments,
                            if call.success { "ok" } else { "failed" },
                            call.duration_ms
                        ));
                    }
                    out.push('\n');
                }
                out.push_str(text);
                out
            }
            Rendered::Warning(message) => format!("Warning: {}", message),
            Rendered::Error(message) => message.clone(),
        }
    }
}
