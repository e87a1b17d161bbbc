//! A team member exposed to the team leader as a callable tool

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use super::required_str;
use crate::agent::Runnable;
use crate::tools::{
    BoxedTool, HandlerTool, ToolError, ToolExecutionContext, ToolHandler, ToolMetadata, ToolSchema,
};

/// Reply used when a member answers with nothing
pub const EMPTY_MEMBER_REPLY: &str = "The member returned no content.";

/// Tool name for a member: `transfer_task_to_<snake_case_name>`
pub fn member_tool_name(member_name: &str) -> String {
    let slug: String = member_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let slug = slug
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    format!("transfer_task_to_{}", slug)
}

struct AgentToolHandler {
    member: Arc<dyn Runnable>,
}

#[async_trait]
impl ToolHandler for AgentToolHandler {
    async fn handle(&self, args: Value, ctx: &ToolExecutionContext) -> Result<Value, ToolError> {
        let task = required_str(&args, "task")?;
        let prompt = match args.get("expected_output").and_then(Value::as_str) {
            Some(expected) if !expected.trim().is_empty() => {
                format!("{}\n\nExpected output: {}", task, expected.trim())
            }
            _ => task.to_string(),
        };

        tracing::info!(
            member = %self.member.name(),
            leader = ?ctx.agent_id,
            "Delegating task to team member"
        );

        let response = self
            .member
            .run(&prompt)
            .await
            .map_err(|e| ToolError::transient(format!("{} failed: {}", self.member.name(), e)))?;

        let text = response.text().unwrap_or(EMPTY_MEMBER_REPLY).to_string();
        Ok(Value::String(text))
    }
}

/// Wrap a member so the leader can hand it a task
pub fn agent_tool(member: Arc<dyn Runnable>, role: Option<&str>) -> BoxedTool {
    let name = member_tool_name(member.name());
    let description = match role {
        Some(role) => format!("Hand a task to {}. Role: {}", member.name(), role),
        None => format!("Hand a task to {}.", member.name()),
    };

    Arc::new(HandlerTool::new(
        ToolMetadata::new(name, description)
            .with_returns("The member's answer")
            .with_tag("team"),
        ToolSchema::new(json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "A clear description of the task for the member"
                },
                "expected_output": {
                    "type": "string",
                    "description": "What the answer should contain"
                }
            },
            "required": ["task"]
        })),
        AgentToolHandler { member },
    ))
}
