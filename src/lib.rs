//! callscope library interface
//!
//! Contact-center call-analysis service: audio upload, speech-to-text,
//! heuristic quality scoring, and coaching-plan generation, driven by an
//! asynchronous per-call pipeline with real-time progress events.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::events::EventBus;
use crate::services::PipelineRunner;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Pipeline runner for detached per-call processing
    pub runner: Arc<PipelineRunner>,
    /// Resolved service configuration
    pub config: Arc<Config>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        runner: Arc<PipelineRunner>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db,
            event_bus,
            runner,
            config,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // Multipart bodies need headroom over the audio size cap
    let body_limit = (state.config.storage.max_upload_bytes as usize).saturating_add(64 * 1024);

    Router::new()
        .merge(api::call_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
