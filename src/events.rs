//! Progress event types and EventBus
//!
//! The pipeline publishes one event per meaningful status transition. Events
//! carry the call identifier so SSE subscribers can filter to a single call's
//! stream (room-scoped delivery).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{CallStatus, PipelineStep};

/// Call pipeline event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CallEvent {
    /// Pipeline run launched for a call
    PipelineStarted {
        call_id: Uuid,
        /// Run number (0 for first attempt, incremented on retries)
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// Call status advanced to a new stage
    StatusChanged {
        call_id: Uuid,
        status: CallStatus,
        /// Human-readable description of the current operation
        message: String,
        /// Approximate completion percentage (progress-bar convention)
        progress: u8,
        timestamp: DateTime<Utc>,
    },

    /// Pipeline run finished successfully
    PipelineCompleted {
        call_id: Uuid,
        /// Total wall-clock processing time
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Pipeline run failed at a stage
    PipelineFailed {
        call_id: Uuid,
        step: PipelineStep,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl CallEvent {
    /// Call this event belongs to (SSE room key)
    pub fn call_id(&self) -> Uuid {
        match self {
            CallEvent::PipelineStarted { call_id, .. }
            | CallEvent::StatusChanged { call_id, .. }
            | CallEvent::PipelineCompleted { call_id, .. }
            | CallEvent::PipelineFailed { call_id, .. } => *call_id,
        }
    }

    /// Event type name for SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            CallEvent::PipelineStarted { .. } => "PipelineStarted",
            CallEvent::StatusChanged { .. } => "StatusChanged",
            CallEvent::PipelineCompleted { .. } => "PipelineCompleted",
            CallEvent::PipelineFailed { .. } => "PipelineFailed",
        }
    }
}

/// Central event distribution bus for pipeline progress events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the pipeline)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CallEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    pub fn emit(&self, event: CallEvent) -> Result<usize, broadcast::error::SendError<CallEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscribers case
    ///
    /// Progress events are fire-and-forget with at-most-once delivery; a
    /// pipeline run must not fail because nobody is watching.
    pub fn emit_lossy(&self, event: CallEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event emitted with no subscribers");
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
