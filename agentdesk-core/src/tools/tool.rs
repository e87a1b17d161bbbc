//! Tool trait and metadata definitions
//!
//! Tools are the way agents reach search engines, market data, and files.
//! Each tool declares its parameters and execution logic.

use super::result::{ToolError, ToolProvenance, ToolResultEnvelope, ValidationError};
use crate::llm::ToolSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Tool metadata for LLM-friendly discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool name (unique identifier)
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// When should the LLM use this tool?
    pub usage_hints: Vec<String>,

    /// What the tool returns
    pub returns: String,

    /// Tags for categorization
    pub tags: Vec<String>,
}

impl ToolMetadata {
    /// Create new metadata with required fields
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            usage_hints: Vec::new(),
            returns: "Tool-specific result".to_string(),
            tags: Vec::new(),
        }
    }

    /// Add a usage hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.usage_hints.push(hint.into());
        self
    }

    /// Set return description
    pub fn with_returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = returns.into();
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Description plus usage hints, as offered to the model
    pub fn model_description(&self) -> String {
        if self.usage_hints.is_empty() {
            return self.description.clone();
        }
        format!("{} {}", self.description, self.usage_hints.join(" "))
    }
}

/// JSON Schema for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// JSON Schema for input parameters
    pub parameters: Value,
}

impl ToolSchema {
    /// Create a schema from a JSON Schema value
    pub fn new(parameters: Value) -> Self {
        Self { parameters }
    }

    /// Names listed under `required`
    pub fn required_fields(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Context provided to tool execution
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Agent making the call
    pub agent_id: Option<String>,

    /// Run id for correlation
    pub trace_id: Option<String>,
}

impl ToolExecutionContext {
    /// Create a new context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set agent ID
    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Set trace ID
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Core tool trait
///
/// Implement this trait to create a tool that agents can use.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get tool metadata
    fn metadata(&self) -> &ToolMetadata;

    /// Get tool name (convenience method)
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Get tool description (convenience method)
    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Get the JSON schema for this tool's parameters
    fn schema(&self) -> ToolSchema;

    /// Declaration offered to the model
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.metadata().model_description(),
            parameters: self.schema().parameters,
        }
    }

    /// Validate input arguments before execution
    ///
    /// The default checks that every `required` field of the schema is present.
    fn validate(&self, args: &Value) -> Result<(), Vec<ValidationError>> {
        let missing: Vec<ValidationError> = self
            .schema()
            .required_fields()
            .into_iter()
            .filter(|field| args.get(*field).is_none_or(Value::is_null))
            .map(|field| ValidationError::new(field, format!("{} is required", field)))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Execute the tool with given arguments
    ///
    /// Called only after `validate` passes.
    async fn execute(
        &self,
        args: Value,
        ctx: &ToolExecutionContext,
    ) -> Result<ToolResultEnvelope, ToolError>;
}

/// Handler trait for simpler tool implementations
///
/// Use this when you don't need full control over the result envelope.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute and return a simple result
    async fn handle(&self, args: Value, ctx: &ToolExecutionContext) -> Result<Value, ToolError>;
}

/// Wrapper to convert a ToolHandler into a full Tool
pub struct HandlerTool<H: ToolHandler> {
    metadata: ToolMetadata,
    schema: ToolSchema,
    handler: H,
}

impl<H: ToolHandler> HandlerTool<H> {
    /// Create a new handler tool
    pub fn new(metadata: ToolMetadata, schema: ToolSchema, handler: H) -> Self {
        Self {
            metadata,
            schema,
            handler,
        }
    }
}

#[async_trait]
impl<H: ToolHandler + 'static> Tool for HandlerTool<H> {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(
        &self,
        args: Value,
        ctx: &ToolExecutionContext,
    ) -> Result<ToolResultEnvelope, ToolError> {
        use sha2::{Digest, Sha256};

        let started_at = chrono::Utc::now();

        let args_json = serde_json::to_string(&args).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(args_json.as_bytes());
        let args_hash = format!("{:x}", hasher.finalize());

        let result = self.handler.handle(args, ctx).await;

        let duration = (chrono::Utc::now() - started_at)
            .to_std()
            .unwrap_or_default();

        let mut provenance = ToolProvenance::new(&self.metadata.name, &args_hash[..16])
            .with_started_at(started_at)
            .with_duration(duration);

        if let Some(ref agent_id) = ctx.agent_id {
            provenance = provenance.with_agent_id(agent_id);
        }
        if let Some(ref trace_id) = ctx.trace_id {
            provenance = provenance.with_trace_id(trace_id);
        }

        match result {
            Ok(value) => Ok(ToolResultEnvelope::success(value, provenance)),
            Err(error) => Ok(ToolResultEnvelope::error(error, provenance)),
        }
    }
}

/// Type alias for boxed tools
pub type BoxedTool = Arc<dyn Tool>;
