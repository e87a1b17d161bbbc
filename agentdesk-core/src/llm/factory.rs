//! Factory for creating LLM providers from configuration

use crate::config::LlmSettings;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::llm::LLMProvider;
use crate::llm::providers::groq::GroqProvider;
use std::sync::Arc;

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create a provider bound to one model.
    ///
    /// # Arguments
    ///
    /// * `settings` - Inference API settings (endpoint, timeout)
    /// * `credentials` - API credentials
    /// * `model` - Model id; falls back to `settings.model` when empty
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn create(
        settings: &LlmSettings,
        credentials: &Credentials,
        model: &str,
    ) -> Result<Arc<dyn LLMProvider>> {
        let model = if model.trim().is_empty() {
            settings.model.as_str()
        } else {
            model
        };

        let provider = GroqProvider::new(credentials.api_key(), model)
            .with_base_url(settings.base_url.clone())
            .with_timeout(settings.request_timeout)?;

        tracing::debug!("Created Groq provider for model {}", model);
        Ok(Arc::new(provider))
    }
}
