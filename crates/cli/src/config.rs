//! Configuration loading from advisor.toml.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mcp::EndpointConfig;
use policy::GuardrailConfig;
use runtime::{AdvisorSettings, ApiKeys, ProviderRegistry};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "advisor.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote tool endpoint.
    pub endpoint: EndpointSection,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub providers: ProvidersConfig,
    pub orchestrator: OrchestratorConfig,
    pub guardrails: GuardrailConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointSection {
    pub url: String,
    pub timeout_secs: u64,
    /// Extra headers sent on every request, e.g. `Authorization`.
    pub headers: HashMap<String, String>,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            url: "https://requirements-advisor-production.up.railway.app/mcp".to_string(),
            timeout_secs: 60,
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    /// Sessions idle longer than this are deleted.
    pub session_ttl_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/sessions.db"),
            session_ttl_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    /// Model id overrides keyed by provider key.
    pub models: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_iterations: usize,
    pub history_window: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let settings = AdvisorSettings::default();
        Self {
            max_iterations: settings.max_iterations,
            history_window: settings.history_window,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment
    /// overrides. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::parse(&content)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override settings from environment variables.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("MCP_SERVER_URL") {
            self.endpoint.url = url;
        }
        if let Some(key) = var("ANTHROPIC_API_KEY") {
            self.providers.anthropic_api_key = Some(key);
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.providers.openai_api_key = Some(key);
        }
        if let Some(key) = var("GOOGLE_API_KEY") {
            self.providers.google_api_key = Some(key);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(path) = var("DATABASE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
    }

    pub fn endpoint_config(&self) -> EndpointConfig {
        EndpointConfig {
            url: self.endpoint.url.clone(),
            headers: self.endpoint.headers.clone(),
            timeout: Duration::from_secs(self.endpoint.timeout_secs),
        }
    }

    pub fn api_keys(&self) -> ApiKeys {
        ApiKeys {
            anthropic: self.providers.anthropic_api_key.clone(),
            openai: self.providers.openai_api_key.clone(),
            google: self.providers.google_api_key.clone(),
        }
    }

    pub fn registry(&self) -> Result<ProviderRegistry, ConfigError> {
        ProviderRegistry::with_models(&self.providers.models)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn advisor_settings(&self) -> AdvisorSettings {
        AdvisorSettings {
            max_iterations: self.orchestrator.max_iterations,
            history_window: self.orchestrator.history_window,
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server address: {e}")))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
