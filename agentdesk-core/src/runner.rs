//! Query runner
//!
//! One submission moves the runner from `Idle` through `Running` to either
//! `Succeeded` or `Failed`. Blank input never leaves `Idle`. The runner
//! imposes no deadline and never retries.

use crate::agent::{RunResponse, Runnable};
use crate::render::Rendered;

/// Warning for blank input
pub const EMPTY_QUERY_WARNING: &str = "Please enter a query first.";

/// Warning for a response without text
pub const NO_CONTENT_WARNING: &str = "No content returned from the agent.";

/// Why a run failed
#[derive(Debug, Clone, PartialEq)]
pub enum RunFailure {
    /// The call returned but carried no text (soft failure)
    NoContent,
    /// The call raised an error
    Error(String),
}

/// Runner state
#[derive(Debug, Clone, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Succeeded(RunResponse),
    Failed(RunFailure),
}

impl RunState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RunState::Idle)
    }

    /// The response of a successful run
    pub fn response(&self) -> Option<&RunResponse> {
        match self {
            RunState::Succeeded(response) => Some(response),
            _ => None,
        }
    }
}

/// Drives one agent call per submission
#[derive(Debug, Default)]
pub struct QueryRunner {
    state: RunState,
}

impl QueryRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Submit a query and render the outcome
    ///
    /// Blank input yields a warning without calling the agent. Other input
    /// is passed on exactly as entered.
    pub async fn submit(&mut self, runnable: &dyn Runnable, query: &str) -> Rendered {
        if query.trim().is_empty() {
            self.state = RunState::Idle;
            return Rendered::from_state(&self.state, false);
        }

        self.state = RunState::Running;
        tracing::info!(agent = %runnable.name(), "Running query");

        self.state = match runnable.run(query).await {
            Ok(response) if response.text().is_some() => RunState::Succeeded(response),
            Ok(response) => {
                tracing::warn!(agent = %response.agent, run_id = %response.run_id, "Agent returned no content");
                RunState::Failed(RunFailure::NoContent)
            }
            Err(e) => {
                tracing::error!(agent = %runnable.name(), error = %e, "Agent run failed");
                RunState::Failed(RunFailure::Error(e.to_string()))
            }
        };

        Rendered::from_state(&self.state, runnable.show_tool_calls())
    }
}
