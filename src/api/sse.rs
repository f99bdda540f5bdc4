//! Server-Sent Events (SSE) for call progress streaming
//!
//! One stream per call: subscribers receive only the events for the call id
//! in the path (room-scoped delivery). Fire-and-forget, at-most-once.

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::AppState;

/// GET /calls/{id}/events - SSE event stream for one call's pipeline progress
///
/// Streams events:
/// - PipelineStarted
/// - StatusChanged (per stage transition, with progress percentage)
/// - PipelineCompleted
/// - PipelineFailed
pub async fn call_event_stream(
    State(state): State<AppState>,
    Path(call_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Reject streams for unknown calls up front
    crate::db::calls::get_call(&state.db, call_id).await?;

    info!(call_id = %call_id, "New SSE client connected to call events");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                // Heartbeat every 15 seconds
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!(call_id = %call_id, "SSE: sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                Ok(event) = rx.recv() => {
                    // Room scoping: only this call's events
                    if event.call_id() != call_id {
                        continue;
                    }

                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!(call_id = %call_id, event_type, "SSE: broadcasting event");
                            yield Ok(Event::default()
                                .event(event_type)
                                .data(event_json));
                        }
                        Err(e) => {
                            warn!(call_id = %call_id, "SSE: failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}
