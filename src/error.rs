//! Error types for callscope
//!
//! Two layers: `Error` for internal component failures (store, state machine,
//! pipeline re-entry), and `ApiError` for HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::CallStatus;

/// Internal service error
#[derive(Debug, Error)]
pub enum Error {
    /// Database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization of a nested result document failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Call record does not exist
    #[error("call not found: {0}")]
    CallNotFound(Uuid),

    /// Status transition violates the forward-only stage order
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: CallStatus, to: CallStatus },

    /// A pipeline run is already in flight for this call
    #[error("pipeline already running for call {0}")]
    PipelineBusy(Uuid),

    /// Call is not in a state from which a pipeline run may start
    #[error("call {call_id} is in status {status}, cannot start pipeline")]
    NotRunnable { call_id: Uuid, status: CallStatus },

    /// IO error (upload storage)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for internal operations
pub type Result<T> = std::result::Result<T, Error>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g., retry of a call that is not in error status
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payload too large (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Internal service error
    #[error(transparent)]
    Service(#[from] Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Service(ref err) => match err {
                Error::CallNotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("Call not found: {}", id),
                ),
                Error::PipelineBusy(id) => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Pipeline already running for call {}", id),
                ),
                Error::NotRunnable { .. } => {
                    (StatusCode::CONFLICT, "CONFLICT", err.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    err.to_string(),
                ),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
