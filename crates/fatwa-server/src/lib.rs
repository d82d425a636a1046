//! HTTP surface for the fatwa request handler.

pub mod config;
pub mod routes;

use std::sync::Arc;

use fatwa_runtime::providers::{AnthropicProvider, ApiCredential, ProviderError};
use fatwa_runtime::FatwaRequestHandler;

pub use config::{ConfigError, ServerConfig};
pub use routes::{router, ASK_FATWA_PATH};

/// Build the request handler from configuration.
///
/// A missing credential does not stop startup: the handler is built
/// unconfigured and every request reports it.
pub fn build_handler(config: &ServerConfig) -> Result<FatwaRequestHandler, ProviderError> {
    let credential = match ApiCredential::resolve(
        config.backend.api_key.as_deref(),
        &config.backend.api_key_env,
        "Anthropic API key",
    ) {
        Ok(credential) => credential,
        Err(ProviderError::NotConfigured(reason)) => {
            tracing::warn!(%reason, "Starting without a backend credential");
            return Ok(FatwaRequestHandler::unconfigured(config.handler.clone()));
        }
        Err(e) => return Err(e),
    };

    tracing::debug!(source = ?credential.source(), "Resolved backend credential");
    let provider = AnthropicProvider::new(credential)?.with_base_url(&config.backend.base_url);

    Ok(FatwaRequestHandler::new(
        Arc::new(provider),
        config.handler.clone(),
    ))
}
