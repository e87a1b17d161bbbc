//! Error types for AgentDesk operations

/// Result type for AgentDesk operations
pub type Result<T> = std::result::Result<T, DeskError>;

/// Error types for the AgentDesk library
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    /// Required credential is not present in the environment
    #[error("{0} is missing from environment variables.")]
    MissingCredential(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Inference API call failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// Agent run failed
    #[error("Agent error: {0}")]
    Agent(String),

    /// Selection outside of a desk's enumeration
    #[error("Unknown agent choice: {0}")]
    UnknownChoice(String),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for DeskError {
    fn from(s: String) -> Self {
        DeskError::Other(s)
    }
}

impl From<&str> for DeskError {
    fn from(s: &str) -> Self {
        DeskError::Other(s.to_string())
    }
}

impl From<crate::tools::RegistryError> for DeskError {
    fn from(err: crate::tools::RegistryError) -> Self {
        DeskError::Agent(err.to_string())
    }
}

impl From<anyhow::Error> for DeskError {
    fn from(err: anyhow::Error) -> Self {
        DeskError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_message() {
        let err = DeskError::MissingCredential("GROQ_API_KEY".to_string());
        assert_eq!(
            err.to_string(),
            "GROQ_API_KEY is missing from environment variables."
        );
    }

    #[test]
    fn test_from_str() {
        let err: DeskError = "boom".into();
        assert!(matches!(err, DeskError::Other(ref m) if m == "boom"));
    }

    #[test]
    fn test_duplicate_tool_is_agent_error() {
        let err: DeskError = crate::tools::RegistryError::DuplicateTool("echo".into()).into();
        assert!(matches!(err, DeskError::Agent(ref m) if m.contains("echo")));
    }
}
