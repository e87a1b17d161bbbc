//! Core agent implementation
//!
//! An `Agent` is a model binding plus a set of tools and prompt settings.
//! `run` drives the tool-calling loop: the model is offered the agent's
//! tools, requested tools are executed one after another and their output
//! is fed back, until the model answers in plain text or the round budget
//! is spent. The last round never offers tools.

use crate::error::{DeskError, Result};
use crate::llm::{LLMProvider, LLMRequest, Message, ToolCall};
use crate::tools::{BoxedTool, ToolError, ToolExecutionContext, ToolRegistry, ToolResultEnvelope};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Default number of model calls per run
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 6;

/// Record of one tool invocation during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallSummary {
    /// Name of the tool
    pub tool_name: String,
    /// Arguments as sent by the model
    pub arguments: Value,
    /// Whether the tool produced a result
    pub success: bool,
    /// Execution time in milliseconds
    pub duration_ms: u64,
    /// Hash prefix of the arguments, absent when the tool never ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_hash: Option<String>,
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    /// Name of the agent or team that answered
    pub agent: String,
    /// Final answer, if the model produced one
    pub content: Option<String>,
    /// Tools called during the run, in order
    pub tool_calls: Vec<ToolCallSummary>,
    /// Correlation id of the run
    pub run_id: String,
    /// Number of model calls made
    pub rounds: usize,
}

impl RunResponse {
    /// Content, if present and not blank
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Anything that answers a query: a single agent or a team
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    /// Whether tool calls should be shown next to the answer
    fn show_tool_calls(&self) -> bool {
        false
    }

    /// Answer a query
    async fn run(&self, query: &str) -> Result<RunResponse>;
}

/// A model with tools and instructions
///
/// # Example
///
/// ```rust,ignore
/// let agent = Agent::builder()
///     .name("Web Agent")
///     .role("Search the web for information")
///     .provider(provider)
///     .tool(duckduckgo_tool(&settings)?)
///     .instruction("Always include the sources.")
///     .markdown(true)
///     .build()?;
///
/// let response = agent.run("Latest Rust release?").await?;
/// ```
#[derive(Clone)]
pub struct Agent {
    name: String,
    role: Option<String>,
    description: Option<String>,
    instructions: Vec<String>,
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    show_tool_calls: bool,
    markdown: bool,
    debug_mode: bool,
    max_tool_rounds: usize,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl Agent {
    /// Create a new agent builder
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    /// Tools bound to this agent
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn markdown(&self) -> bool {
        self.markdown
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    /// System prompt built from description, role, instructions and the markdown hint
    pub fn system_prompt(&self) -> String {
        let mut sections = Vec::new();

        if let Some(description) = &self.description {
            sections.push(description.clone());
        }
        if let Some(role) = &self.role {
            sections.push(format!("<your_role>\n{}\n</your_role>", role));
        }
        if !self.instructions.is_empty() {
            let items: Vec<String> = self
                .instructions
                .iter()
                .map(|i| format!("- {}", i))
                .collect();
            sections.push(format!("<instructions>\n{}\n</instructions>", items.join("\n")));
        }
        if self.markdown {
            sections.push(
                "<additional_information>\n- Use markdown to format your answers.\n</additional_information>"
                    .to_string(),
            );
        }

        sections.join("\n\n")
    }

    fn request(&self, messages: &[Message], offer_tools: bool) -> LLMRequest {
        LLMRequest {
            messages: messages.to_vec(),
            tools: if offer_tools {
                self.tools.specs()
            } else {
                Vec::new()
            },
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..Default::default()
        }
    }

    async fn call_tool(&self, call: &ToolCall, ctx: &ToolExecutionContext) -> (String, ToolCallSummary) {
        let started = Instant::now();
        let arguments = parse_arguments(&call.arguments);

        let (outcome, provenance) = match &arguments {
            Ok(args) => match self.execute_tool(&call.name, args.clone(), ctx).await {
                Ok(envelope) => {
                    let outcome = match envelope.get_error() {
                        Some(error) => Err(error.clone()),
                        None => Ok(envelope.to_model_text()),
                    };
                    (outcome, Some(envelope.provenance))
                }
                Err(e) => (Err(e), None),
            },
            Err(e) => (Err(e.clone()), None),
        };

        let duration = provenance
            .as_ref()
            .map(|p| p.duration)
            .unwrap_or_else(|| started.elapsed());
        let summary = ToolCallSummary {
            tool_name: call.name.clone(),
            arguments: arguments.unwrap_or(Value::Null),
            success: outcome.is_ok(),
            duration_ms: duration.as_millis() as u64,
            args_hash: provenance.map(|p| p.args_hash),
        };

        let text = match outcome {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(agent = %self.name, tool = %call.name, error = %e, "Tool call failed");
                format!("Error: {}", e.message)
            }
        };

        (text, summary)
    }

    async fn execute_tool(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolExecutionContext,
    ) -> std::result::Result<ToolResultEnvelope, ToolError> {
        let tool = self
            .tools
            .require(name)
            .map_err(|e| ToolError::not_found(e.to_string()))?;

        tool.validate(&args).map_err(ToolError::validation)?;

        tool.execute(args, ctx).await
    }
}

fn parse_arguments(raw: &str) -> std::result::Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
        .map_err(|e| ToolError::invalid_response(format!("Invalid tool arguments: {}", e)))
}

#[async_trait]
impl Runnable for Agent {
    fn name(&self) -> &str {
        &self.name
    }

    fn show_tool_calls(&self) -> bool {
        self.show_tool_calls
    }

    async fn run(&self, query: &str) -> Result<RunResponse> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let ctx = ToolExecutionContext::new()
            .with_agent_id(&self.name)
            .with_trace_id(&run_id);

        let mut messages = Vec::with_capacity(2);
        let system_prompt = self.system_prompt();
        if !system_prompt.is_empty() {
            messages.push(Message::system(system_prompt));
        }
        messages.push(Message::user(query));

        tracing::info!(agent = %self.name, run_id = %run_id, "Agent run started");

        let mut tool_calls = Vec::new();
        let mut round = 0;
        loop {
            round += 1;
            let offer_tools = round < self.max_tool_rounds && !self.tools.is_empty();
            let request = self.request(&messages, offer_tools);

            if self.debug_mode {
                tracing::debug!(
                    agent = %self.name,
                    round,
                    messages = request.messages.len(),
                    tools = request.tools.len(),
                    "Sending model request"
                );
            }

            let response = self.provider.generate_request(&request).await?;

            if !offer_tools || !response.has_tool_calls() {
                tracing::info!(
                    agent = %self.name,
                    run_id = %run_id,
                    rounds = round,
                    tool_calls = tool_calls.len(),
                    "Agent run completed"
                );
                return Ok(RunResponse {
                    agent: self.name.clone(),
                    content: response.content,
                    tool_calls,
                    run_id,
                    rounds: round,
                });
            }

            messages.push(Message::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                if self.debug_mode {
                    tracing::debug!(agent = %self.name, tool = %call.name, args = %call.arguments, "Calling tool");
                }
                let (text, summary) = self.call_tool(call, &ctx).await;
                tool_calls.push(summary);
                messages.push(Message::tool_result(&call.id, text));
            }
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("tools", &self.tools)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}

/// Builder for creating agents
pub struct AgentBuilder {
    name: Option<String>,
    role: Option<String>,
    description: Option<String>,
    instructions: Vec<String>,
    provider: Option<Arc<dyn LLMProvider>>,
    tools: Vec<BoxedTool>,
    show_tool_calls: bool,
    markdown: bool,
    debug_mode: bool,
    max_tool_rounds: usize,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl AgentBuilder {
    /// Create a new agent builder
    pub fn new() -> Self {
        Self {
            name: None,
            role: None,
            description: None,
            instructions: Vec::new(),
            provider: None,
            tools: Vec::new(),
            show_tool_calls: false,
            markdown: false,
            debug_mode: false,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set agent name (shown to users)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the role given to the model
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set agent description (first section of the system prompt)
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append one instruction
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instructions.push(instruction.into());
        self
    }

    /// Append several instructions
    pub fn instructions<I, S>(mut self, instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instructions
            .extend(instructions.into_iter().map(Into::into));
        self
    }

    /// Set LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Add a tool to this agent
    pub fn tool(mut self, tool: BoxedTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add multiple tools at once
    pub fn tools(mut self, tools: Vec<BoxedTool>) -> Self {
        self.tools.extend(tools);
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

    pub fn debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }

    /// Set the maximum number of model calls per run (at least 1)
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

    /// Build the agent
    pub fn build(self) -> Result<Agent> {
        let name = self
            .name
            .ok_or_else(|| DeskError::Configuration("Agent name is required".to_string()))?;

        let provider = self.provider.ok_or_else(|| {
            DeskError::Configuration(format!("Agent '{}' has no LLM provider", name))
        })?;

        let mut tools = ToolRegistry::new();
        for tool in self.tools {
            tools.register(tool)?;
        }

        Ok(Agent {
            name,
            role: self.role,
            description: self.description,
            instructions: self.instructions,
            provider,
            tools,
            show_tool_calls: self.show_tool_calls,
            markdown: self.markdown,
            debug_mode: self.debug_mode,
            max_tool_rounds: self.max_tool_rounds,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::error::{DeskError, Result};
    use crate::llm::{LLMProvider, LLMRequest, LLMResponse, ToolCall};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that replays canned responses and records requests
    #[derive(Default)]
    pub struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<LLMResponse>>>,
        pub requests: Mutex<Vec<LLMRequest>>,
    }

    impl ScriptedProvider {
        pub fn new(responses: Vec<Result<LLMResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn text(content: &str) -> Result<LLMResponse> {
            Ok(LLMResponse {
                content: Some(content.to_string()),
                ..Default::default()
            })
        }

        pub fn call(id: &str, name: &str, arguments: &str) -> Result<LLMResponse> {
            Ok(LLMResponse {
                content: None,
                tool_calls: vec![ToolCall {
                    id: id.to_string(),
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                }],
                usage: None,
            })
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn request(&self, index: usize) -> LLMRequest {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DeskError::Llm("script exhausted".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ScriptedProvider;
    use super::*;
    use crate::llm::MessageRole;
    use crate::tools::{HandlerTool, ToolHandler, ToolMetadata, ToolSchema};
    use serde_json::json;

    struct Quote;

    #[async_trait]
    impl ToolHandler for Quote {
        async fn handle(
            &self,
            args: Value,
            _ctx: &ToolExecutionContext,
        ) -> std::result::Result<Value, ToolError> {
            let symbol = args["symbol"].as_str().unwrap_or_default();
            if symbol == "FAIL" {
                return Err(ToolError::transient("upstream down"));
            }
            if symbol == "SLOW" {
                tokio::time::sleep(std::time::Duration::from_millis(40)).await;
            }
            Ok(Value::String(format!("{}: 100.0000 USD", symbol)))
        }
    }

    fn quote_tool() -> BoxedTool {
        Arc::new(HandlerTool::new(
            ToolMetadata::new("get_current_stock_price", "Price"),
            ToolSchema::new(json!({
                "type": "object",
                "properties": { "symbol": { "type": "string" } },
                "required": ["symbol"]
            })),
            Quote,
        ))
    }

    fn agent_with(provider: Arc<ScriptedProvider>) -> Agent {
        Agent::builder()
            .name("Finance Agent")
            .role("Get financial data")
            .provider(provider)
            .tool(quote_tool())
            .instructions(["Use tables to display data."])
            .markdown(true)
            .show_tool_calls(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_system_prompt_sections() {
        let provider = Arc::new(ScriptedProvider::default());
        let prompt = agent_with(provider).system_prompt();

        assert!(prompt.contains("<your_role>\nGet financial data\n</your_role>"));
        assert!(prompt.contains("- Use tables to display data."));
        assert!(prompt.contains("Use markdown"));
    }

    #[test]
    fn test_builder_requires_name_and_provider() {
        assert!(matches!(
            Agent::builder().build(),
            Err(DeskError::Configuration(_))
        ));
        assert!(matches!(
            Agent::builder().name("x").build(),
            Err(DeskError::Configuration(_))
        ));
    }

    #[test]
    fn test_builder_rejects_duplicate_tools() {
        let result = Agent::builder()
            .name("x")
            .provider(Arc::new(ScriptedProvider::default()))
            .tool(quote_tool())
            .tool(quote_tool())
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::text("Hello")]));
        let agent = agent_with(provider.clone());

        let response = agent.run("hi").await.unwrap();
        assert_eq!(response.text(), Some("Hello"));
        assert_eq!(response.agent, "Finance Agent");
        assert_eq!(response.rounds, 1);
        assert!(response.tool_calls.is_empty());

        let request = provider.request(0);
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[1].content.as_deref(), Some("hi"));
        assert_eq!(request.tools.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_round_feeds_result_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::call("call_1", "get_current_stock_price", r#"{"symbol":"NVDA"}"#),
            ScriptedProvider::text("| NVDA | 100 |"),
        ]));
        let agent = agent_with(provider.clone());

        let response = agent.run("price of NVDA").await.unwrap();
        assert_eq!(response.text(), Some("| NVDA | 100 |"));
        assert_eq!(response.rounds, 2);
        assert_eq!(response.tool_calls.len(), 1);
        assert!(response.tool_calls[0].success);
        assert_eq!(response.tool_calls[0].arguments, json!({ "symbol": "NVDA" }));

        let second = provider.request(1);
        let tool_message = second.messages.last().unwrap();
        assert_eq!(tool_message.role, MessageRole::Tool);
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_message.content.as_deref(), Some("NVDA: 100.0000 USD"));
    }

    #[tokio::test]
    async fn test_tool_failures_are_fed_back_as_text() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(crate::llm::LLMResponse {
                content: None,
                tool_calls: vec![
                    ToolCall {
                        id: "a".into(),
                        name: "no_such_tool".into(),
                        arguments: "{}".into(),
                    },
                    ToolCall {
                        id: "b".into(),
                        name: "get_current_stock_price".into(),
                        arguments: r#"{"symbol":"FAIL"}"#.into(),
                    },
                    ToolCall {
                        id: "c".into(),
                        name: "get_current_stock_price".into(),
                        arguments: "{}".into(),
                    },
                ],
                usage: None,
            }),
            ScriptedProvider::text("done"),
        ]));
        let agent = agent_with(provider.clone());

        let response = agent.run("q").await.unwrap();
        assert_eq!(response.text(), Some("done"));
        assert!(response.tool_calls.iter().all(|c| !c.success));
        assert!(response.tool_calls[0].args_hash.is_none());
        assert!(response.tool_calls[1].args_hash.is_some());
        assert!(response.tool_calls[2].args_hash.is_none());

        let second = provider.request(1);
        let texts: Vec<&str> = second
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .filter_map(|m| m.content.as_deref())
            .collect();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].starts_with("Error: Tool 'no_such_tool' not found"));
        assert_eq!(texts[1], "Error: upstream down");
        assert!(texts[2].contains("symbol"));
    }

    #[tokio::test]
    async fn test_tool_calls_carry_execution_record() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(crate::llm::LLMResponse {
                content: None,
                tool_calls: ["NVDA", "SLOW", "NVDA"]
                    .iter()
                    .enumerate()
                    .map(|(i, symbol)| ToolCall {
                        id: format!("call_{}", i),
                        name: "get_current_stock_price".into(),
                        arguments: format!(r#"{{"symbol":"{}"}}"#, symbol),
                    })
                    .collect(),
                usage: None,
            }),
            ScriptedProvider::text("done"),
        ]));
        let agent = agent_with(provider);

        let calls = agent.run("q").await.unwrap().tool_calls;
        let hashes: Vec<&str> = calls
            .iter()
            .map(|c| c.args_hash.as_deref().unwrap())
            .collect();
        assert!(hashes.iter().all(|h| h.len() == 16));
        assert_eq!(hashes[0], hashes[2]);
        assert_ne!(hashes[0], hashes[1]);
        assert!(calls[1].duration_ms >= 30);
    }

    #[tokio::test]
    async fn test_last_round_offers_no_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::call("1", "get_current_stock_price", r#"{"symbol":"A"}"#),
            ScriptedProvider::call("2", "get_current_stock_price", r#"{"symbol":"B"}"#),
        ]));
        let agent = Agent::builder()
            .name("Loop")
            .provider(provider.clone())
            .tool(quote_tool())
            .max_tool_rounds(2)
            .build()
            .unwrap();

        let response = agent.run("q").await.unwrap();
        assert_eq!(provider.request_count(), 2);
        assert!(provider.request(1).tools.is_empty());
        assert_eq!(response.tool_calls.len(), 1);
        assert!(response.text().is_none());
    }

    #[tokio::test]
    async fn test_blank_content_is_not_text() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedProvider::text("  \n")]));
        let response = agent_with(provider).run("q").await.unwrap();
        assert!(response.content.is_some());
        assert!(response.text().is_none());
    }

    #[tokio::test]
    async fn test_provider_error_fails_run() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(DeskError::Llm(
            "Groq API error (401 Unauthorized): bad key".into(),
        ))]));
        let err = agent_with(provider).run("q").await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
