//! Tool system for agent capabilities
//!
//! Tools are declared to the model with a JSON schema, validated before they
//! run, and return a structured envelope with provenance.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentdesk_core::config::ToolSettings;
//! use agentdesk_core::tools::{ToolRegistry, builtin};
//!
//! # fn main() -> agentdesk_core::error::Result<()> {
//! let settings = ToolSettings::default();
//! let mut registry = ToolRegistry::new();
//! registry.register(builtin::duckduckgo_tool(&settings)?)?;
//! assert_eq!(registry.specs().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod builtin;
mod registry;
mod result;
mod tool;

pub use registry::{RegistryError, ToolRegistry, ToolSummary};
pub use result::{
    ToolError, ToolErrorKind, ToolProvenance, ToolResult, ToolResultEnvelope, ValidationError,
};
pub use tool::{BoxedTool, HandlerTool, Tool, ToolExecutionContext, ToolHandler, ToolMetadata, ToolSchema};
