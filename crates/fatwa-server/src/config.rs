//! Server configuration, loaded from YAML.
//!
//! ```yaml
//! bind: 0.0.0.0:3000
//! backend:
//!   api_key_env: ANTHROPIC_API_KEY
//! handler:
//!   model: claude-opus-4-1-20250805
//!   max_tokens: 4000
//!   timeout: 60s
//! cors:
//!   allowed_origins: ["https://example.org"]
//! ```

use fatwa_runtime::providers::{ANTHROPIC_API_KEY_ENV, DEFAULT_BASE_URL};
use fatwa_runtime::HandlerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid bind address '{0}'")]
    InvalidBind(String),

    #[error("Backend base_url must be an http(s) URL, got '{0}'")]
    InvalidBaseUrl(String),

    #[error("handler.timeout must be greater than zero")]
    ZeroTimeout,

    #[error("handler.max_tokens must be greater than zero")]
    ZeroMaxTokens,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub backend: BackendConfig,
    pub handler: HandlerConfig,
    pub cors: CorsConfig,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Inline key; prefer `api_key_env` outside local development
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: ANTHROPIC_API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Browser origins allowed to call the endpoint. Empty disables CORS;
/// `"*"` allows any origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            backend: BackendConfig::default(),
            handler: HandlerConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;

        let base_url = &self.backend.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url.clone()));
        }
        if self.handler.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.handler.max_tokens == 0 {
            return Err(ConfigError::ZeroMaxTokens);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))
    }
}
