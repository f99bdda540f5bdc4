//! Call record and pipeline state machine
//!
//! A call record progresses through 7 defined statuses:
//! uploaded → transcribing → transcribed → analyzing → analyzed →
//! generating-coaching → completed
//!
//! Any in-progress status may transition to `error` on unrecoverable stage
//! failure. The progression is forward-only: a completed stage is never
//! revisited within one run; recovery is a full-pipeline restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{CallAnalysis, CoachingPlan};

/// Call pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    /// Audio stored, pipeline not yet started
    Uploaded,
    /// Speech-to-text in progress
    Transcribing,
    /// Transcript written
    Transcribed,
    /// Scoring engine in progress
    Analyzing,
    /// Analysis written
    Analyzed,
    /// Coaching plan generation in progress
    GeneratingCoaching,
    /// Pipeline finished successfully (terminal)
    Completed,
    /// Pipeline failed (terminal until manual retry)
    Error,
}

impl CallStatus {
    /// Position in the forward stage order, None for `Error`
    fn rank(self) -> Option<u8> {
        match self {
            CallStatus::Uploaded => Some(0),
            CallStatus::Transcribing => Some(1),
            CallStatus::Transcribed => Some(2),
            CallStatus::Analyzing => Some(3),
            CallStatus::Analyzed => Some(4),
            CallStatus::GeneratingCoaching => Some(5),
            CallStatus::Completed => Some(6),
            CallStatus::Error => None,
        }
    }

    /// Whether this status permits advancing to `to`
    ///
    /// Forward-only: exactly one step along the stage order, or `Error` from
    /// any non-terminal status.
    pub fn can_transition_to(self, to: CallStatus) -> bool {
        if to == CallStatus::Error {
            return !self.is_terminal();
        }
        match (self.rank(), to.rank()) {
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }

    /// Terminal statuses: completed, or error (until manual retry)
    pub fn is_terminal(self) -> bool {
        matches!(self, CallStatus::Completed | CallStatus::Error)
    }

    /// Approximate completion percentage for progress bars
    ///
    /// The exact values are a UX convention, not a strict contract.
    pub fn progress_percent(self) -> u8 {
        match self {
            CallStatus::Uploaded => 0,
            CallStatus::Transcribing => 33,
            CallStatus::Transcribed => 66,
            CallStatus::Analyzing => 80,
            CallStatus::Analyzed => 90,
            CallStatus::GeneratingCoaching => 95,
            CallStatus::Completed => 100,
            CallStatus::Error => 0,
        }
    }

    /// Wire/database representation (kebab-case)
    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Uploaded => "uploaded",
            CallStatus::Transcribing => "transcribing",
            CallStatus::Transcribed => "transcribed",
            CallStatus::Analyzing => "analyzing",
            CallStatus::Analyzed => "analyzed",
            CallStatus::GeneratingCoaching => "generating-coaching",
            CallStatus::Completed => "completed",
            CallStatus::Error => "error",
        }
    }

    /// Parse from the wire/database representation
    pub fn parse(s: &str) -> Option<CallStatus> {
        match s {
            "uploaded" => Some(CallStatus::Uploaded),
            "transcribing" => Some(CallStatus::Transcribing),
            "transcribed" => Some(CallStatus::Transcribed),
            "analyzing" => Some(CallStatus::Analyzing),
            "analyzed" => Some(CallStatus::Analyzed),
            "generating-coaching" => Some(CallStatus::GeneratingCoaching),
            "completed" => Some(CallStatus::Completed),
            "error" => Some(CallStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStep {
    Transcribe,
    Analyze,
    Coach,
}

impl PipelineStep {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::Transcribe => "transcribe",
            PipelineStep::Analyze => "analyze",
            PipelineStep::Coach => "coach",
        }
    }

    pub fn parse(s: &str) -> Option<PipelineStep> {
        match s {
            "transcribe" => Some(PipelineStep::Transcribe),
            "analyze" => Some(PipelineStep::Analyze),
            "coach" => Some(PipelineStep::Coach),
            _ => None,
        }
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded for one stage boundary in the processing history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Started,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Started => "started",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<StepStatus> {
        match s {
            "started" => Some(StepStatus::Started),
            "completed" => Some(StepStatus::Completed),
            "failed" => Some(StepStatus::Failed),
            _ => None,
        }
    }
}

/// Status transition record (returned by `CallRecord::transition_to`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub call_id: Uuid,
    pub old_status: CallStatus,
    pub new_status: CallStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// Source audio file metadata, immutable after upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSource {
    /// Stored path under the upload directory
    pub path: String,
    /// Original filename as uploaded
    pub original_name: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Detected MIME type
    pub mime_type: String,
}

/// Transcript produced by the speech-to-text stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Full transcript text
    pub text: String,
    /// Time-aligned segments
    pub segments: Vec<TranscriptSegment>,
    /// Detected language code, if reported
    pub language: Option<String>,
    /// Transcription confidence (0.0 - 1.0), if reported
    pub confidence: Option<f64>,
}

/// One time-aligned transcript segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: u32,
    /// Segment start time (seconds)
    pub start: f64,
    /// Segment end time (seconds)
    pub end: f64,
    pub text: String,
}

/// Last fatal pipeline failure, overwritten on each failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFailure {
    pub message: String,
    /// Stable failure code (e.g. TRANSCRIPTION_FAILED)
    pub code: String,
    /// Stage that failed
    pub step: PipelineStep,
    /// Number of pipeline runs that have failed for this call
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// Per-stage timing metrics, accumulated as stages complete
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub transcription_ms: Option<u64>,
    pub analysis_ms: Option<u64>,
    pub coaching_ms: Option<u64>,
    /// Total pipeline wall-clock time
    pub total_ms: Option<u64>,
}

/// Append-only processing history entry
///
/// The durable audit trail of stage starts, completions, and failures,
/// independent of the current `error` field. Entries are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub call_id: Uuid,
    pub step: PipelineStep,
    pub status: StepStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Stage duration, present for completed/failed entries
    pub duration_ms: Option<u64>,
    /// Error description, present for failed entries
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn started(call_id: Uuid, step: PipelineStep, message: impl Into<String>) -> Self {
        Self {
            call_id,
            step,
            status: StepStatus::Started,
            message: message.into(),
            timestamp: Utc::now(),
            duration_ms: None,
            error: None,
        }
    }

    pub fn completed(
        call_id: Uuid,
        step: PipelineStep,
        message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id,
            step,
            status: StepStatus::Completed,
            message: message.into(),
            timestamp: Utc::now(),
            duration_ms: Some(duration_ms),
            error: None,
        }
    }

    pub fn failed(
        call_id: Uuid,
        step: PipelineStep,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        let error = error.into();
        Self {
            call_id,
            step,
            status: StepStatus::Failed,
            message: format!("{} stage failed", step),
            timestamp: Utc::now(),
            duration_ms: Some(duration_ms),
            error: Some(error),
        }
    }
}

/// The central entity: one uploaded call and its processing state
///
/// Created by the upload handler, then exclusively mutated by the pipeline
/// runner. The persisted record is the single source of truth for pipeline
/// state; each stage consumes the previous stage's persisted output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: Uuid,
    /// Owning user, when the caller identified one
    pub user_id: Option<Uuid>,
    pub audio: AudioSource,
    pub status: CallStatus,
    /// Written once per successful run, after the transcribe stage
    pub transcript: Option<Transcript>,
    /// Written once per successful run, after the analyze stage
    pub analysis: Option<CallAnalysis>,
    /// Written once per successful run, after the coaching stage
    pub coaching_plan: Option<CoachingPlan>,
    /// Last fatal failure, overwritten on each failure
    pub error: Option<CallFailure>,
    pub performance: PerformanceMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallRecord {
    /// Create new call record in `Uploaded` status
    pub fn new(user_id: Option<Uuid>, audio: AudioSource) -> Self {
        let now = Utc::now();
        Self {
            call_id: Uuid::new_v4(),
            user_id,
            audio,
            status: CallStatus::Uploaded,
            transcript: None,
            analysis: None,
            coaching_plan: None,
            error: None,
            performance: PerformanceMetrics::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance to a new status, enforcing the forward-only stage order
    pub fn transition_to(&mut self, new_status: CallStatus) -> Result<StatusTransition, Error> {
        if !self.status.can_transition_to(new_status) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }
        let transition = StatusTransition {
            call_id: self.call_id,
            old_status: self.status,
            new_status,
            transitioned_at: Utc::now(),
        };
        self.status = new_status;
        self.updated_at = transition.transitioned_at;
        Ok(transition)
    }

    /// Reset an errored call for a fresh full-pipeline run
    ///
    /// The only permitted backward move. Stale stage results are kept in
    /// place; each stage overwrites its result field on success, so a retried
    /// run replaces rather than merges.
    pub fn reset_for_retry(&mut self) {
        self.status = CallStatus::Uploaded;
        self.performance = PerformanceMetrics::default();
        self.updated_at = Utc::now();
    }

    /// Record a fatal stage failure
    ///
    /// Increments `retry_count` from any prior failure on this record.
    pub fn record_failure(&mut self, step: PipelineStep, code: &str, message: String) {
        let retry_count = self.error.as_ref().map(|e| e.retry_count + 1).unwrap_or(0);
        self.error = Some(CallFailure {
            message,
            code: code.to_string(),
            step,
            retry_count,
            timestamp: Utc::now(),
        });
        self.status = CallStatus::Error;
        self.updated_at = Utc::now();
    }
}
