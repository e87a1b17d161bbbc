//! Teams of agents
//!
//! A team is a leader agent whose only tools are its members. The leader
//! hands tasks to members (one at a time, in the order it asks for them)
//! and writes the combined answer.

use crate::agent::{Agent, DEFAULT_MAX_TOOL_ROUNDS, RunResponse, Runnable};
use crate::error::{DeskError, Result};
use crate::llm::LLMProvider;
use crate::tools::builtin::agent_tool;
use async_trait::async_trait;
use std::sync::Arc;

const LEADER_DESCRIPTION: &str = "You are the leader of a team of agents. Transfer each part of \
the task to the member best suited for it, then combine their answers into one response.";

/// A leader agent coordinating member agents
#[derive(Clone)]
pub struct Team {
    leader: Agent,
    members: Vec<Arc<dyn Runnable>>,
}

impl Team {
    /// Create a new team builder
    pub fn builder() -> TeamBuilder {
        TeamBuilder::new()
    }

    /// Member names, in registration order
    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name()).collect()
    }

    /// The coordinating agent
    pub fn leader(&self) -> &Agent {
        &self.leader
    }
}

#[async_trait]
impl Runnable for Team {
    fn name(&self) -> &str {
        self.leader.name()
    }

    fn show_tool_calls(&self) -> bool {
        self.leader.show_tool_calls()
    }

    async fn run(&self, query: &str) -> Result<RunResponse> {
        tracing::info!(
            team = %self.leader.name(),
            members = ?self.member_names(),
            "Team run started"
        );
        self.leader.run(query).await
    }
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Team")
            .field("name", &self.leader.name())
            .field("members", &self.member_names())
            .finish()
    }
}

/// Builder for creating teams
pub struct TeamBuilder {
    name: Option<String>,
    provider: Option<Arc<dyn LLMProvider>>,
    members: Vec<(Arc<dyn Runnable>, Option<String>)>,
    instructions: Vec<String>,
    show_tool_calls: bool,
    markdown: bool,
    max_tool_rounds: usize,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl TeamBuilder {
    pub fn new() -> Self {
        Self {
            name: None,
            provider: None,
            members: Vec::new(),
            instructions: Vec::new(),
            show_tool_calls: false,
            markdown: false,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Model used by the leader
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Add a member
    pub fn member(mut self, member: Arc<dyn Runnable>) -> Self {
        self.members.push((member, None));
        self
    }

    /// Add an agent as a member, advertising its role to the leader
    pub fn agent(mut self, agent: Agent) -> Self {
        let role = agent.role().map(str::to_string);
        self.members.push((Arc::new(agent), role));
        self
    }

    /// Shared instructions for the leader
    pub fn instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions
            .extend(instructions.into_iter().map(Into::into));
        self
    }

    pub fn show_tool_calls(mut self, show: bool) -> Self {
        self.show_tool_calls = show;
        self
    }

    pub fn markdown(mut self, markdown: bool) -> Self {
        self.markdown = markdown;
        self
    }

    pub fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: Option<usize>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build the team
    pub fn build(self) -> Result<Team> {
        let name = self
            .name
            .ok_or_else(|| DeskError::Configuration("Team name is required".to_string()))?;
        if self.members.is_empty() {
            return Err(DeskError::Configuration(format!(
                "Team '{}' has no members",
                name
            )));
        }
        let provider = self.provider.ok_or_else(|| {
            DeskError::Configuration(format!("Team '{}' has no LLM provider", name))
        })?;

        let tools = self
            .members
            .iter()
            .map(|(member, role)| agent_tool(Arc::clone(member), role.as_deref()))
            .collect();

        let leader = Agent::builder()
            .name(name)
            .description(LEADER_DESCRIPTION)
            .provider(provider)
            .tools(tools)
            .instructions(self.instructions)
            .show_tool_calls(self.show_tool_calls)
            .markdown(self.markdown)
            .max_tool_rounds(self.max_tool_rounds)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()?;

        Ok(Team {
            leader,
            members: self.members.into_iter().map(|(member, _)| member).collect(),
        })
    }
}

impl Default for TeamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::ScriptedProvider;
    use crate::llm::MessageRole;

    fn member(name: &str, role: &str, reply: &str) -> Agent {
        Agent::builder()
            .name(name)
            .role(role)
            .provider(Arc::new(ScriptedProvider::new(vec![ScriptedProvider::text(reply)])))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_members() {
        let err = Team::builder()
            .name("Both (Team)")
            .provider(Arc::new(ScriptedProvider::default()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no members"));
    }

    #[test]
    fn test_leader_tools_are_members() {
        let team = Team::builder()
            .name("Both (Team)")
            .provider(Arc::new(ScriptedProvider::default()))
            .agent(member("Web Agent", "Search the web", "w"))
            .agent(member("Finance Agent", "Get financial data", "f"))
            .instructions(["Always include sources.", "Use tables to display data."])
            .build()
            .unwrap();

        assert_eq!(team.name(), "Both (Team)");
        assert_eq!(team.member_names(), vec!["Web Agent", "Finance Agent"]);

        let specs = team.leader().tools().specs();
        assert_eq!(specs[0].name, "transfer_task_to_web_agent");
        assert_eq!(specs[1].name, "transfer_task_to_finance_agent");
        assert!(specs[1].description.contains("Get financial data"));
        assert_eq!(team.leader().instructions().len(), 2);
    }

    #[tokio::test]
    async fn test_members_run_sequentially_and_answers_are_combined() {
        let leader_provider = Arc::new(ScriptedProvider::new(vec![
            Ok(crate::llm::LLMResponse {
                content: None,
                tool_calls: vec![
                    crate::llm::ToolCall {
                        id: "1".into(),
                        name: "transfer_task_to_web_agent".into(),
                        arguments: r#"{"task":"news on NVDA"}"#.into(),
                    },
                    crate::llm::ToolCall {
                        id: "2".into(),
                        name: "transfer_task_to_finance_agent".into(),
                        arguments: r#"{"task":"NVDA price"}"#.into(),
                    },
                ],
                usage: None,
            }),
            ScriptedProvider::text("combined"),
        ]));

        let team = Team::builder()
            .name("Both (Team)")
            .provider(leader_provider.clone())
            .agent(member("Web Agent", "Search the web", "NVDA beat earnings"))
            .agent(member("Finance Agent", "Get financial data", "NVDA: 181.5"))
            .show_tool_calls(true)
            .build()
            .unwrap();

        let response = team.run("Analyze NVDA").await.unwrap();
        assert_eq!(response.text(), Some("combined"));
        assert_eq!(response.agent, "Both (Team)");
        assert!(team.show_tool_calls());

        let names: Vec<&str> = response.tool_calls.iter().map(|c| c.tool_name.as_str()).collect();
        assert_eq!(names, vec!["transfer_task_to_web_agent", "transfer_task_to_finance_agent"]);

        let follow_up = leader_provider.request(1);
        let replies: Vec<&str> = follow_up
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .filter_map(|m| m.content.as_deref())
            .collect();
        assert_eq!(replies, vec!["NVDA beat earnings", "NVDA: 181.5"]);
    }
}
