//! The `/api/ask-fatwa` HTTP endpoint.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use fatwa_core::FatwaResult;
use fatwa_runtime::{CancellationToken, ErrorKind, FatwaRequestHandler, HandlerError};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;

pub const ASK_FATWA_PATH: &str = "/api/ask-fatwa";

/// Nonstandard "client closed request" status.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Clone)]
pub struct AppState {
    handler: Arc<FatwaRequestHandler>,
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: Option<String>,
}

/// Build the application router.
pub fn router(handler: Arc<FatwaRequestHandler>, cors: &CorsConfig) -> Router {
    let router = Router::new()
        .route(ASK_FATWA_PATH, post(ask_fatwa).fallback(method_not_allowed))
        .with_state(AppState { handler })
        .layer(TraceLayer::new_for_http());

    match cors_layer(cors) {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

fn cors_layer(cors: &CorsConfig) -> Option<CorsLayer> {
    if cors.allowed_origins.is_empty() {
        return None;
    }

    let origin = if cors.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = cors
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "Ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

async fn ask_fatwa(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<FatwaResult>, ApiError> {
    let question = match payload {
        Ok(Json(request)) => request.question.unwrap_or_default(),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable request body");
            return Err(ApiError::bad_request());
        }
    };

    // Dropped with this future if the connection goes away mid-request.
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();

    let fatwa = state
        .handler
        .handle_with_cancellation(&question, token)
        .await?;
    Ok(Json(fatwa))
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(json!({ "error": "Method not allowed" })),
    )
}

/// Error response body: `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    fn bad_request() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: fatwa_runtime::error::MSG_QUESTION_REQUIRED,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<HandlerError> for ApiError {
    fn from(err: HandlerError) -> Self {
        Self {
            status: status_for(&err),
            message: err.public_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Backend statuses pass through; faults without one map to gateway codes.
fn status_for(err: &HandlerError) -> StatusCode {
    match err.kind() {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::BackendUnavailable | ErrorKind::BackendRejected => {
            match (err.backend_status(), err) {
                (Some(status), _) => {
                    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                (None, HandlerError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
                (None, _) => StatusCode::BAD_GATEWAY,
            }
        }
        ErrorKind::BackendProtocolError | ErrorKind::MalformedResponse => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorKind::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
