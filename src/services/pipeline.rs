//! Call processing pipeline runner
//!
//! Drives a call record through the stages
//! Transcribe → Analyze → Coach, persisting status after each stage and
//! publishing progress events.
//!
//! # State progression
//! uploaded → transcribing → transcribed → analyzing → analyzed →
//! generating-coaching → completed (error reachable from any stage)
//!
//! Stages execute strictly sequentially: each stage consumes the previous
//! stage's persisted output (the record is reloaded at each stage boundary),
//! so a crash between stages leaves the record consistent and restartable.
//!
//! Stage failures are caught here and converted into persisted state plus a
//! published event; nothing propagates to the HTTP layer. There is no
//! automatic retry: recovery is a fresh full-pipeline run against the same
//! call id, which overwrites stale stage results.

use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db;
use crate::error::{Error, Result};
use crate::events::{CallEvent, EventBus};
use crate::models::{CallRecord, CallStatus, HistoryEntry, PipelineStep};
use crate::services::{CoachingGenerator, ScoringEngine, SpeechToText};

/// Pipeline runner
///
/// One logical run per call at a time; re-entry is rejected while a run for
/// the same call id is in flight.
pub struct PipelineRunner {
    db: SqlitePool,
    event_bus: EventBus,
    speech_to_text: Arc<dyn SpeechToText>,
    scoring: ScoringEngine,
    coaching: CoachingGenerator,
    active: RwLock<HashSet<Uuid>>,
}

impl PipelineRunner {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        speech_to_text: Arc<dyn SpeechToText>,
        scoring: ScoringEngine,
        coaching: CoachingGenerator,
    ) -> Self {
        Self {
            db,
            event_bus,
            speech_to_text,
            scoring,
            coaching,
            active: RwLock::new(HashSet::new()),
        }
    }

    /// Launch a detached pipeline run for a call
    ///
    /// Returns the task handle so the owning process can observe the run's
    /// lifecycle. All outcomes are otherwise observable via the persisted
    /// record and the event stream.
    pub fn spawn(self: &Arc<Self>, call_id: Uuid) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = runner.run(call_id).await {
                tracing::error!(call_id = %call_id, error = %e, "Pipeline run aborted");
            }
        })
    }

    /// Execute the full pipeline for a call
    ///
    /// The call must be in `Uploaded` status, or `Error` for a manual retry.
    pub async fn run(&self, call_id: Uuid) -> Result<()> {
        {
            let mut active = self.active.write().await;
            if !active.insert(call_id) {
                tracing::warn!(call_id = %call_id, "Rejected concurrent pipeline re-entry");
                return Err(Error::PipelineBusy(call_id));
            }
        }
        let result = self.run_guarded(call_id).await;
        self.active.write().await.remove(&call_id);
        result
    }

    async fn run_guarded(&self, call_id: Uuid) -> Result<()> {
        let mut call = db::calls::get_call(&self.db, call_id).await?;

        match call.status {
            CallStatus::Uploaded => {}
            CallStatus::Error => {
                // Manual retry: full restart, stages overwrite stale results
                call.reset_for_retry();
                db::calls::save_call(&self.db, &call).await?;
            }
            status => {
                return Err(Error::NotRunnable { call_id, status });
            }
        }

        let attempt = call.error.as_ref().map(|e| e.retry_count + 1).unwrap_or(0);
        let run_start = Instant::now();

        tracing::info!(call_id = %call_id, attempt, "Starting call pipeline");
        self.event_bus.emit_lossy(CallEvent::PipelineStarted {
            call_id,
            attempt,
            timestamp: Utc::now(),
        });

        // Stage 1: Transcribe
        let stage_start = Instant::now();
        self.begin_stage(
            &mut call,
            PipelineStep::Transcribe,
            CallStatus::Transcribing,
            "Transcribing audio",
        )
        .await?;

        let audio_path = PathBuf::from(&call.audio.path);
        match self.speech_to_text.transcribe(&audio_path).await {
            Ok(transcript) => {
                let elapsed = stage_start.elapsed().as_millis() as u64;
                call.transcript = Some(transcript);
                call.performance.transcription_ms = Some(elapsed);
                self.complete_stage(
                    &mut call,
                    PipelineStep::Transcribe,
                    CallStatus::Transcribed,
                    "Transcription complete",
                    elapsed,
                )
                .await?;
            }
            Err(e) => {
                let elapsed = stage_start.elapsed().as_millis() as u64;
                return self
                    .fail(&mut call, PipelineStep::Transcribe, e.code(), e.to_string(), elapsed)
                    .await;
            }
        }

        // Stage 2: Analyze, consuming the persisted transcript
        let mut call = db::calls::get_call(&self.db, call_id).await?;
        let stage_start = Instant::now();
        self.begin_stage(
            &mut call,
            PipelineStep::Analyze,
            CallStatus::Analyzing,
            "Analyzing transcript",
        )
        .await?;

        let transcript_text = match call.transcript.as_ref() {
            Some(t) => t.text.clone(),
            None => {
                let elapsed = stage_start.elapsed().as_millis() as u64;
                return self
                    .fail(
                        &mut call,
                        PipelineStep::Analyze,
                        "MISSING_TRANSCRIPT",
                        "transcript not present after transcribe stage".to_string(),
                        elapsed,
                    )
                    .await;
            }
        };

        match self.scoring.analyze(&transcript_text).await {
            Ok(analysis) => {
                let elapsed = stage_start.elapsed().as_millis() as u64;
                call.analysis = Some(analysis);
                call.performance.analysis_ms = Some(elapsed);
                self.complete_stage(
                    &mut call,
                    PipelineStep::Analyze,
                    CallStatus::Analyzed,
                    "Analysis complete",
                    elapsed,
                )
                .await?;
            }
            Err(e) => {
                let elapsed = stage_start.elapsed().as_millis() as u64;
                return self
                    .fail(&mut call, PipelineStep::Analyze, e.code(), e.to_string(), elapsed)
                    .await;
            }
        }

        // Stage 3: Coach, consuming the persisted analysis and transcript
        let mut call = db::calls::get_call(&self.db, call_id).await?;
        let stage_start = Instant::now();
        self.begin_stage(
            &mut call,
            PipelineStep::Coach,
            CallStatus::GeneratingCoaching,
            "Generating coaching plan",
        )
        .await?;

        let (analysis, transcript_text) = match (call.analysis.clone(), call.transcript.as_ref()) {
            (Some(a), Some(t)) => (a, t.text.clone()),
            _ => {
                let elapsed = stage_start.elapsed().as_millis() as u64;
                return self
                    .fail(
                        &mut call,
                        PipelineStep::Coach,
                        "MISSING_ANALYSIS",
                        "analysis not present after analyze stage".to_string(),
                        elapsed,
                    )
                    .await;
            }
        };

        match self.coaching.generate(&analysis, &transcript_text).await {
            Ok(plan) => {
                let elapsed = stage_start.elapsed().as_millis() as u64;
                let total = run_start.elapsed().as_millis() as u64;
                call.coaching_plan = Some(plan);
                call.performance.coaching_ms = Some(elapsed);
                call.performance.total_ms = Some(total);
                self.complete_stage(
                    &mut call,
                    PipelineStep::Coach,
                    CallStatus::Completed,
                    "Coaching plan ready",
                    elapsed,
                )
                .await?;

                tracing::info!(
                    call_id = %call_id,
                    total_ms = total,
                    "Call pipeline completed"
                );
                self.event_bus.emit_lossy(CallEvent::PipelineCompleted {
                    call_id,
                    duration_ms: total,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                let elapsed = stage_start.elapsed().as_millis() as u64;
                return self
                    .fail(&mut call, PipelineStep::Coach, e.code(), e.to_string(), elapsed)
                    .await;
            }
        }

        Ok(())
    }

    /// Open a stage: advance status, persist, append history, publish
    async fn begin_stage(
        &self,
        call: &mut CallRecord,
        step: PipelineStep,
        status: CallStatus,
        message: &str,
    ) -> Result<()> {
        call.transition_to(status)?;
        db::calls::save_call(&self.db, call).await?;
        db::calls::append_history(&self.db, &HistoryEntry::started(call.call_id, step, message))
            .await?;

        tracing::info!(call_id = %call.call_id, step = %step, status = %status, "Stage started");
        self.event_bus.emit_lossy(CallEvent::StatusChanged {
            call_id: call.call_id,
            status,
            message: message.to_string(),
            progress: status.progress_percent(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Close a stage: advance status, persist results durably, append
    /// history, publish. The next stage does not start until this returns.
    async fn complete_stage(
        &self,
        call: &mut CallRecord,
        step: PipelineStep,
        status: CallStatus,
        message: &str,
        duration_ms: u64,
    ) -> Result<()> {
        call.transition_to(status)?;
        db::calls::save_call(&self.db, call).await?;
        db::calls::append_history(
            &self.db,
            &HistoryEntry::completed(call.call_id, step, message, duration_ms),
        )
        .await?;

        tracing::info!(
            call_id = %call.call_id,
            step = %step,
            status = %status,
            duration_ms,
            "Stage completed"
        );
        self.event_bus.emit_lossy(CallEvent::StatusChanged {
            call_id: call.call_id,
            status,
            message: message.to_string(),
            progress: status.progress_percent(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Convert a stage failure into persisted state plus a published event
    async fn fail(
        &self,
        call: &mut CallRecord,
        step: PipelineStep,
        code: &str,
        message: String,
        duration_ms: u64,
    ) -> Result<()> {
        tracing::error!(
            call_id = %call.call_id,
            step = %step,
            code,
            error = %message,
            "Pipeline stage failed"
        );

        db::calls::append_history(
            &self.db,
            &HistoryEntry::failed(call.call_id, step, message.clone(), duration_ms),
        )
        .await?;

        call.record_failure(step, code, message.clone());
        db::calls::save_call(&self.db, call).await?;

        self.event_bus.emit_lossy(CallEvent::PipelineFailed {
            call_id: call.call_id,
            step,
            message,
            timestamp: Utc::now(),
        });

        // The failure is recorded state, not a propagated error
        Ok(())
    }
}
