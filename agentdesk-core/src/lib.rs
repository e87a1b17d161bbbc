//! # AgentDesk
//!
//! Pre-built LLM agents behind two single-page desks:
//! - **Market desk**: web agent, finance agent, and a news + finance team
//! - **Research desk**: web, news, finance and data analyst agents, with a
//!   session history, result downloads, and CSV statistics
//!
//! Agents talk to Groq's OpenAI-compatible chat completions endpoint and
//! use native function calling for their tools (DuckDuckGo, Google News,
//! Yahoo Finance, CSV summary).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentdesk_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = DeskConfig::load()?;
//!     let credentials = Credentials::load()?;
//!     let registry = AgentRegistry::build(&config, &credentials)?;
//!
//!     let mut runner = QueryRunner::new();
//!     let agent = registry.runnable(AgentChoice::Finance);
//!     let rendered = runner.submit(agent.as_ref(), "NVDA fundamentals").await;
//!     println!("{}", rendered.to_plain_text());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod config;
pub mod credentials;
pub mod error;
pub mod history;
pub mod llm;
pub mod registry;
pub mod render;
pub mod runner;
pub mod team;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentBuilder, RunResponse, Runnable, ToolCallSummary};
    pub use crate::config::{DeskConfig, LlmSettings, ServerConfig, ToolSettings, UploadConfig};
    pub use crate::credentials::{API_KEY_VAR, Credentials};
    pub use crate::error::{DeskError, Result};
    pub use crate::history::{Download, ExportFormat, HistoryEntry, HistoryLog};
    pub use crate::llm::{
        LLMProvider, LLMProviderFactory, LLMRequest, LLMResponse, Message, MessageRole,
    };
    pub use crate::registry::{AgentChoice, AgentRegistry, Desk};
    pub use crate::render::Rendered;
    pub use crate::runner::{QueryRunner, RunFailure, RunState};
    pub use crate::team::{Team, TeamBuilder};
    pub use crate::tools::builtin::{Table, summarize_csv};
    pub use crate::tools::{
        BoxedTool, Tool, ToolError, ToolErrorKind, ToolExecutionContext, ToolRegistry,
        ToolResultEnvelope,
    };
}
