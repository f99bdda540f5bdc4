//! API endpoint routing for callscope

pub mod calls;
pub mod health;
pub mod sse;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

/// Call upload, status, and retry routes
pub fn call_routes() -> Router<AppState> {
    Router::new()
        .route("/calls", post(calls::upload_call))
        .route("/calls/:call_id", get(calls::get_call))
        .route("/calls/:call_id/status", get(calls::get_call_status))
        .route("/calls/:call_id/history", get(calls::get_call_history))
        .route("/calls/:call_id/retry", post(calls::retry_call))
        .route("/calls/:call_id/events", get(sse::call_event_stream))
}

/// Health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health::health_check))
}
