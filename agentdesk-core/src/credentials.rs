//! API credential loading
//!
//! The inference API key is the only required setting. It is read once at
//! startup, after an optional `.env` file has been merged into the process
//! environment, and then passed explicitly to the provider factory.

use std::fmt;

use crate::error::{DeskError, Result};

/// Environment variable holding the Groq API key
pub const API_KEY_VAR: &str = "GROQ_API_KEY";

/// Inference API credentials
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    /// Wrap an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Load `.env` (if present) and read the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::MissingCredential`] when the variable is unset or blank.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the API key through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(API_KEY_VAR) {
            Some(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(DeskError::MissingCredential(API_KEY_VAR.to_string())),
        }
    }

    /// The API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}
