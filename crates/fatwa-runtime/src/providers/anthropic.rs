//! Anthropic Messages API provider.
//!
//! ## Security
//!
//! The API key lives in an [`ApiCredential`] and is exposed only while
//! setting the `x-api-key` header.

use super::{ApiCredential, Completion, CompletionConfig, LlmProvider, ProviderError, TokenUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Value of the `anthropic-version` header.
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    /// Create a provider from an already-resolved credential.
    ///
    /// An empty credential is a configuration fault, not a request fault.
    pub fn new(credential: ApiCredential) -> Result<Self, ProviderError> {
        if credential.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "{} is empty",
                credential.name()
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/messages", self.base_url.trim_end_matches('/'))
    }
}

/// Messages API request format.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [UserMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

fn build_request<'a>(prompt: &'a str, config: &'a CompletionConfig) -> MessagesRequest<'a> {
    MessagesRequest {
        model: &config.model,
        max_tokens: config.max_tokens,
        messages: [UserMessage {
            role: "user",
            content: prompt,
        }],
    }
}

/// Messages API response format.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: String,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)] // Required for deserialization, not read directly
    type_: String,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

/// Decode a success body and concatenate its text segments.
fn parse_success_body(body: &str) -> Result<Completion, ProviderError> {
    let response: MessagesResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Protocol(e.to_string()))?;

    let segments: Vec<String> = response
        .content
        .into_iter()
        .filter_map(|block| block.text)
        .collect();

    if segments.is_empty() {
        return Err(ProviderError::Protocol(
            "reply contains no text content".to_string(),
        ));
    }

    Ok(Completion {
        text: segments.concat(),
        model: response.model,
        stop_reason: response.stop_reason,
        usage: TokenUsage {
            prompt_tokens: response.usage.input_tokens,
            completion_tokens: response.usage.output_tokens,
        },
    })
}

/// Classify a non-success response.
fn classify_failure(status: u16, retry_after: Option<Duration>, body: &str) -> ProviderError {
    if status == 429 {
        return ProviderError::RateLimited { retry_after };
    }

    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("{}: {}", envelope.error.kind, envelope.error.message),
        Err(_) => body.chars().take(200).collect(),
    };

    ProviderError::Status { status, message }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        prompt: &str,
        config: &CompletionConfig,
    ) -> Result<Completion, ProviderError> {
        let request = build_request(prompt, config);

        // SECURITY: Only expose the credential here, at the point of use
        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), body = %body, "Anthropic API error");
            return Err(classify_failure(status.as_u16(), retry_after, &body));
        }

        parse_success_body(&body)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
