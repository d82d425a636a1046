//! Handler configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::CompletionConfig;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-opus-4-1-20250805";

/// Output budget for a full four-school answer.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Upper bound on one backend call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for [`FatwaRequestHandler`](crate::FatwaRequestHandler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Model to request from the backend
    pub model: String,

    /// Maximum tokens the backend may generate
    pub max_tokens: u32,

    /// Backend call timeout, e.g. "60s" or "1m 30s"
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HandlerConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Settings passed to the provider on each call.
    pub fn completion(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

/// Serde adapter for humantime duration strings.
pub mod humantime_duration {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}
