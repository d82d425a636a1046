//! Generative backend abstraction.
//!
//! The handler sees the backend only as a capability that turns one prompt
//! into one block of text. This module defines that capability and the
//! Anthropic implementation used in production.
//!
//! ## Security
//!
//! Providers hold their credential as an [`ApiCredential`]; see [`secrets`].

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, ANTHROPIC_API_KEY_ENV, ANTHROPIC_API_VERSION, DEFAULT_BASE_URL};

/// Errors from backend providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected reply structure: {0}")]
    Protocol(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

/// Text produced by one backend call.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Concatenated text of every text segment in the reply
    pub text: String,

    /// Model that actually answered
    pub model: String,

    pub stop_reason: Option<String>,

    pub usage: TokenUsage,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// The generative backend capability: `generate(prompt) -> text`.
///
/// Implementations make exactly one request per call and never retry.
/// Callers own the time bound; dropping the returned future must abandon
/// the in-flight request, so providers never report their own timeout.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text for a single instruction prompt.
    async fn complete(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<Completion, ProviderError>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}
