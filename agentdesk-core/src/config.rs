//! Configuration types for AgentDesk

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DeskError, Result};

/// Default model used by every built-in agent
pub const DEFAULT_MODEL: &str = "qwen/qwen3-32b";

/// Main configuration for AgentDesk
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeskConfig {
    /// Page server configuration
    pub server: ServerConfig,

    /// Inference API configuration
    pub llm: LlmSettings,

    /// Agent runtime configuration
    pub agents: AgentSettings,

    /// Tool data source configuration
    pub tools: ToolSettings,

    /// CSV upload configuration
    pub upload: UploadConfig,
}

/// Page server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Idle time after which a browser session is forgotten
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            session_ttl: Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// Inference API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible base URL
    pub base_url: String,

    /// Model used when an agent does not name one
    pub model: String,

    /// Sampling temperature (provider default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Completion token cap (provider default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Transport timeout for one chat completion request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Agent runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum number of tool-calling rounds before the final answer is forced
    pub max_tool_rounds: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self { max_tool_rounds: 6 }
    }
}

/// Tool data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Maximum search results a tool returns
    pub max_results: usize,

    /// User agent sent to search and finance endpoints
    pub user_agent: String,

    /// Transport timeout for tool requests
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// DuckDuckGo HTML endpoint
    pub duckduckgo_url: String,

    /// Google News RSS search endpoint
    pub google_news_url: String,

    /// Yahoo Finance API host
    pub yahoo_finance_url: String,

    /// Page that hands out the Yahoo session cookie
    pub yahoo_cookie_url: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36".to_string(),
            request_timeout: Duration::from_secs(20),
            duckduckgo_url: "https://html.duckduckgo.com/html/".to_string(),
            google_news_url: "https://news.google.com/rss/search".to_string(),
            yahoo_finance_url: "https://query1.finance.yahoo.com".to_string(),
            yahoo_cookie_url: "https://fc.yahoo.com".to_string(),
        }
    }
}

impl ToolSettings {
    /// Build an HTTP client honoring the configured timeout and user agent
    pub fn http_client(&self) -> Result<reqwest::Client> {
        self.client_builder()
            .build()
            .map_err(|e| DeskError::Configuration(format!("Failed to build HTTP client: {}", e)))
    }

    /// Same as [`http_client`](Self::http_client), keeping cookies between requests
    pub fn http_client_with_cookies(&self) -> Result<reqwest::Client> {
        self.client_builder()
            .cookie_store(true)
            .build()
            .map_err(|e| DeskError::Configuration(format!("Failed to build HTTP client: {}", e)))
    }

    fn client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .user_agent(self.user_agent.as_str())
    }
}

/// CSV upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Fixed path an uploaded CSV is written to before summarizing
    pub path: PathBuf,

    /// Largest accepted upload in bytes
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: std::env::temp_dir().join("agentdesk_upload.csv"),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl DeskConfig {
    /// Load configuration from files and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. User configuration (`<config dir>/agentdesk/agentdesk.toml`)
    /// 3. `agentdesk.toml` in the working directory
    /// 4. File named by `AGENTDESK_CONFIG_PATH`
    /// 5. `AGENTDESK_` environment overrides, nested with `__`
    ///    (e.g. `AGENTDESK_SERVER__PORT=9000`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Same as [`load`](Self::load), with `extra` layered after
    /// `AGENTDESK_CONFIG_PATH` and before the environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid.
    pub fn load_with(extra: Option<&Path>) -> Result<Self> {
        use figment::providers::Env;

        Self::layered(extra, Env::prefixed("AGENTDESK_").split("__"))
    }

    fn layered(extra: Option<&Path>, overrides: impl figment::Provider) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(DeskConfig::default()));

        if let Some(dir) = dirs::config_dir() {
            figment = figment.merge(Toml::file(dir.join("agentdesk").join("agentdesk.toml")));
        }

        figment = figment.merge(Toml::file("agentdesk.toml"));

        if let Ok(path) = std::env::var("AGENTDESK_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = extra {
            if !path.is_file() {
                return Err(DeskError::Configuration(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        let config: DeskConfig = figment
            .merge(overrides)
            .extract()
            .map_err(|e| DeskError::Configuration(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: DeskConfig = Figment::from(Serialized::defaults(DeskConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                DeskError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.llm.base_url.trim().is_empty() {
            return Err(DeskError::Configuration("llm.base_url must not be empty".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(DeskError::Configuration("llm.model must not be empty".to_string()));
        }
        if self.agents.max_tool_rounds == 0 {
            return Err(DeskError::Configuration(
                "agents.max_tool_rounds must be at least 1".to_string(),
            ));
        }
        if self.server.session_ttl.is_zero() {
            return Err(DeskError::Configuration(
                "server.session_ttl must be greater than zero".to_string(),
            ));
        }
        if !(1..=25).contains(&self.tools.max_results) {
            return Err(DeskError::Configuration(
                "tools.max_results must be between 1 and 25".to_string(),
            ));
        }
        Ok(())
    }
}
