//! Pipeline runner integration tests
//!
//! Exercises the full transcribe → analyze → coach state machine against an
//! in-memory database, with mock external AI clients.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use callscope::db;
use callscope::error::Error;
use callscope::events::{CallEvent, EventBus};
use callscope::models::{
    AudioSource, CallRecord, CallStatus, PipelineStep, StepStatus, Transcript, TranscriptSegment,
};
use callscope::services::{
    CoachingGenerator, GenerationError, PipelineRunner, ScoringEngine, SentimentError,
    SentimentScorer, SentimentScores, SpeechToText, TextGenerator, ToxicityError, ToxicityScorer,
    ToxicityScores, TranscriptionError,
};

const TRANSCRIPT_TEXT: &str = "Hello, thank you for calling Acme support. \
    I understand you have a problem with your account. \
    Let me look into the error you described. \
    The issue is resolved and I will follow up tomorrow.";

// ---------------------------------------------------------------------------
// Mock clients
// ---------------------------------------------------------------------------

struct FixedStt(String);

#[async_trait]
impl SpeechToText for FixedStt {
    async fn transcribe(&self, _audio_path: &Path) -> Result<Transcript, TranscriptionError> {
        Ok(Transcript {
            text: self.0.clone(),
            segments: vec![TranscriptSegment {
                id: 0,
                start: 0.0,
                end: 4.0,
                text: self.0.clone(),
            }],
            language: Some("en".to_string()),
            confidence: Some(0.95),
        })
    }
}

struct FailingStt;

#[async_trait]
impl SpeechToText for FailingStt {
    async fn transcribe(&self, _audio_path: &Path) -> Result<Transcript, TranscriptionError> {
        Err(TranscriptionError::Network("connection refused".to_string()))
    }
}

struct SlowStt(Duration);

#[async_trait]
impl SpeechToText for SlowStt {
    async fn transcribe(&self, _audio_path: &Path) -> Result<Transcript, TranscriptionError> {
        tokio::time::sleep(self.0).await;
        Ok(Transcript {
            text: TRANSCRIPT_TEXT.to_string(),
            segments: vec![],
            language: None,
            confidence: None,
        })
    }
}

struct FixedSentiment;

#[async_trait]
impl SentimentScorer for FixedSentiment {
    async fn score(&self, _text: &str) -> Result<SentimentScores, SentimentError> {
        Ok(SentimentScores {
            positive: 0.85,
            negative: 0.15,
        })
    }
}

struct FixedToxicity;

#[async_trait]
impl ToxicityScorer for FixedToxicity {
    async fn score(&self, _text: &str) -> Result<ToxicityScores, ToxicityError> {
        Ok(ToxicityScores {
            toxic: 0.05,
            hate: 0.0,
            obscene: 0.0,
            threat: 0.0,
            insult: 0.0,
        })
    }
}

struct StubGenerator;

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Network("unreachable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    db::init_tables(&pool).await.unwrap();
    pool
}

fn runner_with(pool: &SqlitePool, bus: &EventBus, stt: Arc<dyn SpeechToText>) -> Arc<PipelineRunner> {
    let scoring = ScoringEngine::new(Arc::new(FixedSentiment), Arc::new(FixedToxicity));
    let coaching = CoachingGenerator::new(Arc::new(StubGenerator));
    Arc::new(PipelineRunner::new(
        pool.clone(),
        bus.clone(),
        stt,
        scoring,
        coaching,
    ))
}

async fn create_call(pool: &SqlitePool) -> Uuid {
    let call = CallRecord::new(
        Some(Uuid::new_v4()),
        AudioSource {
            path: "/data/uploads/test.wav".to_string(),
            original_name: "test.wav".to_string(),
            size_bytes: 2048,
            mime_type: "audio/wav".to_string(),
        },
    );
    db::calls::save_call(pool, &call).await.unwrap();
    call.call_id
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_completes_all_stages() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let runner = runner_with(&pool, &bus, Arc::new(FixedStt(TRANSCRIPT_TEXT.to_string())));
    let call_id = create_call(&pool).await;

    runner.run(call_id).await.unwrap();

    let call = db::calls::get_call(&pool, call_id).await.unwrap();
    assert_eq!(call.status, CallStatus::Completed);

    let transcript = call.transcript.expect("transcript written");
    assert_eq!(transcript.text, TRANSCRIPT_TEXT);

    let analysis = call.analysis.expect("analysis written");
    assert!(analysis.overall_score <= 100);
    assert_eq!(analysis.metrics.sentiment.score, 85);
    assert_eq!(analysis.metrics.politeness.score, 95);

    let plan = call.coaching_plan.expect("coaching plan written");
    assert!(plan.generated);
    assert!(!plan.recommendations.is_empty());
    assert!(!plan.resources.is_empty());
    assert!(plan.quiz.len() >= 2);

    assert!(call.performance.transcription_ms.is_some());
    assert!(call.performance.analysis_ms.is_some());
    assert!(call.performance.coaching_ms.is_some());
    assert!(call.performance.total_ms.is_some());
}

#[tokio::test]
async fn happy_path_history_has_one_completed_entry_per_stage() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let runner = runner_with(&pool, &bus, Arc::new(FixedStt(TRANSCRIPT_TEXT.to_string())));
    let call_id = create_call(&pool).await;

    runner.run(call_id).await.unwrap();

    let history = db::calls::load_history(&pool, call_id).await.unwrap();
    assert_eq!(history.len(), 6, "started + completed per stage");

    for step in [PipelineStep::Transcribe, PipelineStep::Analyze, PipelineStep::Coach] {
        let completed = history
            .iter()
            .filter(|h| h.step == step && h.status == StepStatus::Completed)
            .count();
        assert_eq!(completed, 1, "exactly one completed entry for {}", step);
    }

    // Started always precedes completed for each stage
    let positions: Vec<_> = history.iter().map(|h| (h.step, h.status)).collect();
    assert_eq!(positions[0], (PipelineStep::Transcribe, StepStatus::Started));
    assert_eq!(positions[1], (PipelineStep::Transcribe, StepStatus::Completed));
    assert_eq!(positions[4], (PipelineStep::Coach, StepStatus::Started));
    assert_eq!(positions[5], (PipelineStep::Coach, StepStatus::Completed));
}

#[tokio::test]
async fn progress_events_follow_the_stage_order() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let runner = runner_with(&pool, &bus, Arc::new(FixedStt(TRANSCRIPT_TEXT.to_string())));
    let call_id = create_call(&pool).await;

    let mut rx = bus.subscribe();
    runner.run(call_id).await.unwrap();

    let mut progress = Vec::new();
    let mut completed = false;
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.call_id(), call_id);
        match event {
            CallEvent::StatusChanged { progress: p, .. } => progress.push(p),
            CallEvent::PipelineCompleted { .. } => completed = true,
            _ => {}
        }
    }

    assert!(completed, "completion event published");
    assert_eq!(progress, vec![33, 66, 80, 90, 95, 100]);
}

#[tokio::test]
async fn transcription_failure_goes_straight_to_error() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let runner = runner_with(&pool, &bus, Arc::new(FailingStt));
    let call_id = create_call(&pool).await;

    let mut rx = bus.subscribe();
    runner.run(call_id).await.unwrap();

    let call = db::calls::get_call(&pool, call_id).await.unwrap();
    assert_eq!(call.status, CallStatus::Error);
    assert!(call.transcript.is_none());
    assert!(call.analysis.is_none());
    assert!(call.coaching_plan.is_none());

    let failure = call.error.expect("error recorded");
    assert_eq!(failure.step, PipelineStep::Transcribe);
    assert_eq!(failure.code, "TRANSCRIPTION_UNREACHABLE");
    assert_eq!(failure.retry_count, 0);

    // Only the transcribe stage appears in history
    let history = db::calls::load_history(&pool, call_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].status, StepStatus::Failed);
    assert!(history[1].error.is_some());
    assert!(history.iter().all(|h| h.step == PipelineStep::Transcribe));

    let failed_event = loop {
        match rx.try_recv() {
            Ok(CallEvent::PipelineFailed { step, .. }) => break Some(step),
            Ok(_) => continue,
            Err(_) => break None,
        }
    };
    assert_eq!(failed_event, Some(PipelineStep::Transcribe));
}

#[tokio::test]
async fn empty_transcript_fails_the_analyze_stage() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let runner = runner_with(&pool, &bus, Arc::new(FixedStt("   ".to_string())));
    let call_id = create_call(&pool).await;

    runner.run(call_id).await.unwrap();

    let call = db::calls::get_call(&pool, call_id).await.unwrap();
    assert_eq!(call.status, CallStatus::Error);
    // The transcribe stage succeeded; its output stays in place
    assert!(call.transcript.is_some());
    assert!(call.analysis.is_none());

    let failure = call.error.expect("error recorded");
    assert_eq!(failure.step, PipelineStep::Analyze);
    assert_eq!(failure.code, "EMPTY_TRANSCRIPT");
}

#[tokio::test]
async fn retry_restarts_from_scratch_and_overwrites() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let call_id = create_call(&pool).await;

    // First run fails during transcription
    let failing = runner_with(&pool, &bus, Arc::new(FailingStt));
    failing.run(call_id).await.unwrap();
    let call = db::calls::get_call(&pool, call_id).await.unwrap();
    assert_eq!(call.status, CallStatus::Error);

    // Manual retry with the service back up re-runs all three stages
    let healthy = runner_with(&pool, &bus, Arc::new(FixedStt(TRANSCRIPT_TEXT.to_string())));
    healthy.run(call_id).await.unwrap();

    let call = db::calls::get_call(&pool, call_id).await.unwrap();
    assert_eq!(call.status, CallStatus::Completed);
    assert_eq!(call.transcript.unwrap().text, TRANSCRIPT_TEXT);
    assert!(call.analysis.is_some());
    assert!(call.coaching_plan.is_some());

    // History keeps the failed attempt's audit trail
    let history = db::calls::load_history(&pool, call_id).await.unwrap();
    assert!(history
        .iter()
        .any(|h| h.status == StepStatus::Failed && h.step == PipelineStep::Transcribe));
    let completed = history
        .iter()
        .filter(|h| h.status == StepStatus::Completed)
        .count();
    assert_eq!(completed, 3);
}

#[tokio::test]
async fn second_failure_increments_retry_count() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let call_id = create_call(&pool).await;

    let failing = runner_with(&pool, &bus, Arc::new(FailingStt));
    failing.run(call_id).await.unwrap();
    failing.run(call_id).await.unwrap();

    let call = db::calls::get_call(&pool, call_id).await.unwrap();
    assert_eq!(call.status, CallStatus::Error);
    assert_eq!(call.error.unwrap().retry_count, 1);
}

#[tokio::test]
async fn completed_call_is_not_runnable() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let runner = runner_with(&pool, &bus, Arc::new(FixedStt(TRANSCRIPT_TEXT.to_string())));
    let call_id = create_call(&pool).await;

    runner.run(call_id).await.unwrap();
    let err = runner.run(call_id).await.unwrap_err();
    assert!(matches!(err, Error::NotRunnable { .. }));
}

#[tokio::test]
async fn concurrent_re_entry_is_rejected() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let runner = runner_with(&pool, &bus, Arc::new(SlowStt(Duration::from_millis(300))));
    let call_id = create_call(&pool).await;

    let background = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.run(call_id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = runner.run(call_id).await.unwrap_err();
    assert!(matches!(err, Error::PipelineBusy(id) if id == call_id));

    background.await.unwrap().unwrap();
    let call = db::calls::get_call(&pool, call_id).await.unwrap();
    assert_eq!(call.status, CallStatus::Completed);
}

#[tokio::test]
async fn concurrent_pipelines_do_not_cross_write() {
    let pool = test_pool().await;
    let bus = EventBus::new(256);
    let runner = runner_with(&pool, &bus, Arc::new(FixedStt(TRANSCRIPT_TEXT.to_string())));

    let call_a = create_call(&pool).await;
    let call_b = create_call(&pool).await;

    let (ra, rb) = tokio::join!(runner.run(call_a), runner.run(call_b));
    ra.unwrap();
    rb.unwrap();

    for call_id in [call_a, call_b] {
        let call = db::calls::get_call(&pool, call_id).await.unwrap();
        assert_eq!(call.status, CallStatus::Completed);
        assert_eq!(call.call_id, call_id);

        let history = db::calls::load_history(&pool, call_id).await.unwrap();
        assert_eq!(history.len(), 6);
        assert!(history.iter().all(|h| h.call_id == call_id));
    }
}

#[tokio::test]
async fn spawn_returns_an_observable_handle() {
    let pool = test_pool().await;
    let bus = EventBus::new(64);
    let runner = runner_with(&pool, &bus, Arc::new(FixedStt(TRANSCRIPT_TEXT.to_string())));
    let call_id = create_call(&pool).await;

    let handle = runner.spawn(call_id);
    handle.await.unwrap();

    let call = db::calls::get_call(&pool, call_id).await.unwrap();
    assert_eq!(call.status, CallStatus::Completed);
}
