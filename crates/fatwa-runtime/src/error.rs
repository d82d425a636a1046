//! Error taxonomy surfaced by the request handler.

use fatwa_core::{QuestionError, ReplyError};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::providers::ProviderError;

/// Caller-visible message for an empty or missing question.
pub const MSG_QUESTION_REQUIRED: &str = "Question is required";

/// Caller-visible message when no backend credential is configured.
pub const MSG_NOT_CONFIGURED: &str = "API key not configured";

/// Caller-visible message for backend failures.
pub const MSG_BACKEND_FAILED: &str = "Failed to get response from AI";

/// Caller-visible message for every other fault ("an error occurred while
/// processing the request").
pub const MSG_INTERNAL: &str = "حدث خطأ في معالجة الطلب";

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty or missing question; caller-correctable
    InvalidInput,
    /// No backend credential; operator-correctable
    Misconfigured,
    /// Transport failure, timeout or backend-side outage
    BackendUnavailable,
    /// Backend refused the request (bad request, rate limit, auth)
    BackendRejected,
    /// Backend reply carried no extractable text
    BackendProtocolError,
    /// Extracted text was not valid JSON or lacked required keys
    MalformedResponse,
    /// The caller went away before the backend answered
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Misconfigured => "misconfigured",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::BackendRejected => "backend_rejected",
            ErrorKind::BackendProtocolError => "backend_protocol_error",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Errors from [`FatwaRequestHandler`](crate::FatwaRequestHandler).
///
/// `Display` is meant for operators. It never includes the raw backend
/// reply; use [`HandlerError::raw_reply`] to log that explicitly.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] QuestionError),

    #[error("Backend not configured")]
    Misconfigured,

    #[error("Backend unavailable (status {status:?}): {detail}")]
    BackendUnavailable { status: Option<u16>, detail: String },

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend rejected request with status {status}: {detail}")]
    BackendRejected { status: u16, detail: String },

    #[error("Backend protocol error: {0}")]
    BackendProtocol(String),

    #[error("Malformed backend reply: {reason}")]
    MalformedResponse { reason: ReplyError, raw: String },

    #[error("Request cancelled by caller")]
    Cancelled,
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::InvalidInput(_) => ErrorKind::InvalidInput,
            HandlerError::Misconfigured => ErrorKind::Misconfigured,
            HandlerError::BackendUnavailable { .. } | HandlerError::Timeout(_) => {
                ErrorKind::BackendUnavailable
            }
            HandlerError::BackendRejected { .. } => ErrorKind::BackendRejected,
            HandlerError::BackendProtocol(_) => ErrorKind::BackendProtocolError,
            HandlerError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            HandlerError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Backend HTTP status, preserved for logging and propagation.
    pub fn backend_status(&self) -> Option<u16> {
        match self {
            HandlerError::BackendUnavailable { status, .. } => *status,
            HandlerError::BackendRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw backend text behind a malformed reply, for diagnostics only.
    pub fn raw_reply(&self) -> Option<&str> {
        match self {
            HandlerError::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Short localized message that is safe to show the caller.
    pub fn public_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidInput => MSG_QUESTION_REQUIRED,
            ErrorKind::Misconfigured => MSG_NOT_CONFIGURED,
            ErrorKind::BackendUnavailable | ErrorKind::BackendRejected => MSG_BACKEND_FAILED,
            ErrorKind::BackendProtocolError
            | ErrorKind::MalformedResponse
            | ErrorKind::Cancelled => MSG_INTERNAL,
        }
    }
}

impl From<ProviderError> for HandlerError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(_) => HandlerError::Misconfigured,
            ProviderError::Transport(detail) => HandlerError::BackendUnavailable {
                status: None,
                detail,
            },
            ProviderError::Protocol(detail) => HandlerError::BackendProtocol(detail),
            ProviderError::RateLimited { retry_after } => HandlerError::BackendRejected {
                status: 429,
                detail: format!("rate limited, retry after {:?}", retry_after),
            },
            ProviderError::Status { status, message } if status >= 500 => {
                HandlerError::BackendUnavailable {
                    status: Some(status),
                    detail: message,
                }
            }
            ProviderError::Status { status, message } => HandlerError::BackendRejected {
                status,
                detail: message,
            },
        }
    }
}

/// Processing stages of one request.
///
/// `Received → Validating → AwaitingBackend → ParsingReply →
/// ValidatingSchema → Succeeded | Failed`. There is no transition out of a
/// terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    Validating,
    AwaitingBackend,
    ParsingReply,
    ValidatingSchema,
    Succeeded,
    Failed(ErrorKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_rejected_with_429() {
        let err = HandlerError::from(ProviderError::RateLimited { retry_after: None });
        assert_eq!(err.kind(), ErrorKind::BackendRejected);
        assert_eq!(err.backend_status(), Some(429));
    }

    #[test]
    fn test_client_errors_are_rejected() {
        for status in [400, 401, 403, 404, 413] {
            let err = HandlerError::from(ProviderError::Status {
                status,
                message: "bad".to_string(),
            });
            assert_eq!(err.kind(), ErrorKind::BackendRejected);
            assert_eq!(err.backend_status(), Some(status));
        }
    }

    #[test]
    fn test_server_errors_are_unavailable() {
        for status in [500, 502, 503, 529] {
            let err = HandlerError::from(ProviderError::Status {
                status,
                message: "down".to_string(),
            });
            assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
            assert_eq!(err.backend_status(), Some(status));
        }
    }

    #[test]
    fn test_transport_and_timeout_are_unavailable() {
        let err = HandlerError::from(ProviderError::Transport("reset".to_string()));
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert_eq!(err.backend_status(), None);

        let err = HandlerError::Timeout(Duration::from_secs(5));
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert_eq!(err.backend_status(), None);
    }

    #[test]
    fn test_protocol_maps_to_protocol_error() {
        let err = HandlerError::from(ProviderError::Protocol("no text".to_string()));
        assert_eq!(err.kind(), ErrorKind::BackendProtocolError);
        assert_eq!(err.public_message(), MSG_INTERNAL);
    }

    #[test]
    fn test_malformed_display_hides_raw_text() {
        let err = HandlerError::MalformedResponse {
            reason: ReplyError::NotJson("expected value at line 1 column 1".to_string()),
            raw: "internal backend prose".to_string(),
        };
        assert!(!err.to_string().contains("internal backend prose"));
        assert_eq!(err.raw_reply(), Some("internal backend prose"));
        assert_eq!(err.public_message(), MSG_INTERNAL);
    }

    #[test]
    fn test_public_messages() {
        assert_eq!(
            HandlerError::InvalidInput(QuestionError::Empty).public_message(),
            MSG_QUESTION_REQUIRED
        );
        assert_eq!(HandlerError::Misconfigured.public_message(), MSG_NOT_CONFIGURED);
        assert_eq!(
            HandlerError::Timeout(Duration::from_secs(1)).public_message(),
            MSG_BACKEND_FAILED
        );
    }
}
