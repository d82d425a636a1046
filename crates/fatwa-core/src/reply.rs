//! Normalisation and validation of raw backend replies.
//!
//! The backend is told to answer with bare JSON, but frequently wraps it in a
//! Markdown code fence. Every reply goes through the same three steps:
//! 1. Strip fence markers and surrounding whitespace
//! 2. Parse as JSON
//! 3. Validate against the reply schema, then deserialize
//!
//! A reply that fails any step is rejected whole.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::schema::validate_reply_schema;
use crate::types::FatwaResult;

lazy_static! {
    /// Opening (```` ```json ````) and closing (```` ``` ````) fence markers.
    static ref FENCE_PATTERN: Regex = Regex::new(r"```(?i:json)?").unwrap();
}

/// Errors from reply validation.
///
/// Messages describe what was wrong, never the reply text itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplyError {
    #[error("Reply is empty after normalisation")]
    Empty,

    #[error("Reply is not valid JSON: {0}")]
    NotJson(String),

    #[error("Reply violates schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Reply could not be mapped to a fatwa result: {0}")]
    Shape(String),
}

/// Remove Markdown code-fence markers and trim surrounding whitespace.
///
/// Idempotent: applying it to its own output changes nothing.
pub fn strip_code_fences(text: &str) -> String {
    FENCE_PATTERN.replace_all(text, "").trim().to_string()
}

/// Normalise, parse and validate a raw backend reply.
pub fn parse_reply(raw: &str) -> Result<FatwaResult, ReplyError> {
    let normalized = strip_code_fences(raw);
    if normalized.is_empty() {
        return Err(ReplyError::Empty);
    }

    let value: serde_json::Value =
        serde_json::from_str(&normalized).map_err(|e| ReplyError::NotJson(e.to_string()))?;

    if let Err(violations) = validate_reply_schema(&value) {
        tracing::debug!(count = violations.len(), "Reply failed schema validation");
        return Err(ReplyError::Schema(violations));
    }

    serde_json::from_value(value).map_err(|e| ReplyError::Shape(e.to_string()))
}
