//! Tool Registry for tool registration and lookup
//!
//! Each agent owns one registry holding the tools bound to it. The registry
//! keeps registration order so the declarations offered to the model are
//! stable between runs.

use super::tool::{BoxedTool, Tool};
use crate::llm::ToolSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Error type for registry operations
#[derive(Debug, Clone)]
pub enum RegistryError {
    /// Tool with this name already exists
    DuplicateTool(String),
    /// Tool not found
    NotFound(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateTool(name) => {
                write!(f, "Tool '{}' is already registered", name)
            }
            RegistryError::NotFound(name) => {
                write!(f, "Tool '{}' not found", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Summary of a tool for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Tags for categorization
    pub tags: Vec<String>,
}

impl From<&dyn Tool> for ToolSummary {
    fn from(tool: &dyn Tool) -> Self {
        let metadata = tool.metadata();
        Self {
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            tags: metadata.tags.clone(),
        }
    }
}

/// Registry of tools bound to one agent
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, BoxedTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTool` if a tool with the same name exists.
    pub fn register(&mut self, tool: BoxedTool) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<&BoxedTool> {
        self.tools.get(name)
    }

    /// Look up a tool by name, failing with `NotFound`
    pub fn require(&self, name: &str) -> Result<&BoxedTool, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Tools in registration order
    pub fn iter(&self) -> impl Iterator<Item = &BoxedTool> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    /// Declarations offered to the model, in registration order
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.iter().map(|tool| tool.spec()).collect()
    }

    /// Summaries in registration order
    pub fn summaries(&self) -> Vec<ToolSummary> {
        self.iter().map(|tool| ToolSummary::from(tool.as_ref())).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no tool is registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}
