//! HTTP API integration tests
//!
//! Drives the axum router directly with `tower::ServiceExt::oneshot`,
//! backed by an in-memory database and mock external AI clients.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;
use uuid::Uuid;

use callscope::config::Config;
use callscope::db;
use callscope::events::EventBus;
use callscope::models::{AudioSource, CallRecord, Transcript, TranscriptSegment};
use callscope::services::{
    CoachingGenerator, GenerationError, PipelineRunner, ScoringEngine, SentimentError,
    SentimentScorer, SentimentScores, SpeechToText, TextGenerator, ToxicityError, ToxicityScorer,
    ToxicityScores, TranscriptionError,
};
use callscope::AppState;

const TRANSCRIPT_TEXT: &str = "Good morning, thank you for calling support. \
    I understand the problem with your order. \
    The issue is resolved now.";

struct FixedStt;

#[async_trait]
impl SpeechToText for FixedStt {
    async fn transcribe(&self, _audio_path: &Path) -> Result<Transcript, TranscriptionError> {
        Ok(Transcript {
            text: TRANSCRIPT_TEXT.to_string(),
            segments: vec![TranscriptSegment {
                id: 0,
                start: 0.0,
                end: 3.0,
                text: TRANSCRIPT_TEXT.to_string(),
            }],
            language: Some("en".to_string()),
            confidence: Some(0.9),
        })
    }
}

struct FixedSentiment;

#[async_trait]
impl SentimentScorer for FixedSentiment {
    async fn score(&self, _text: &str) -> Result<SentimentScores, SentimentError> {
        Ok(SentimentScores {
            positive: 0.8,
            negative: 0.2,
        })
    }
}

struct FixedToxicity;

#[async_trait]
impl ToxicityScorer for FixedToxicity {
    async fn score(&self, _text: &str) -> Result<ToxicityScores, ToxicityError> {
        Ok(ToxicityScores {
            toxic: 0.1,
            hate: 0.0,
            obscene: 0.0,
            threat: 0.0,
            insult: 0.05,
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

/// Router plus handles to its backing state. The tempdir must stay alive for
/// the duration of the test so uploads have somewhere to land.
struct TestApp {
    router: Router,
    pool: SqlitePool,
    _data_dir: tempfile::TempDir,
}

async fn test_app() -> TestApp {
    let data_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = data_dir.path().to_path_buf();

    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    db::init_tables(&pool).await.unwrap();

    let event_bus = EventBus::new(64);
    let scoring = ScoringEngine::new(Arc::new(FixedSentiment), Arc::new(FixedToxicity));
    let coaching = CoachingGenerator::new(Arc::new(StubGenerator));
    let runner = Arc::new(PipelineRunner::new(
        pool.clone(),
        event_bus.clone(),
        Arc::new(FixedStt),
        scoring,
        coaching,
    ));

    let state = AppState::new(pool.clone(), event_bus, runner, Arc::new(config));
    TestApp {
        router: callscope::build_router(state),
        pool,
        _data_dir: data_dir,
    }
}

// Minimal RIFF/WAVE header followed by silence
fn wav_bytes() -> Vec<u8> {
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&36u32.to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

const BOUNDARY: &str = "callscope-test-boundary";

fn multipart_body(field_name: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field_name, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/calls")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(router: &Router, uri: &str) -> axum::response::Response {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app().await;
    let response = get(&app.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "callscope");
}

#[tokio::test]
async fn upload_accepts_wav_and_completes_the_pipeline() {
    let app = test_app().await;

    let body = multipart_body("audio", "call.wav", "audio/wav", &wav_bytes());
    let response = app.router.clone().oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = json_body(response).await;
    assert_eq!(body["status"], "uploaded");
    let call_id: Uuid = body["call_id"].as_str().unwrap().parse().unwrap();

    // Detached pipeline with instant mocks; poll until terminal
    let mut status = String::new();
    for _ in 0..100 {
        let response = get(&app.router, &format!("/calls/{}/status", call_id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        status = json_body(response).await["status"].as_str().unwrap().to_string();
        if status == "completed" || status == "error" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, "completed");

    let response = get(&app.router, &format!("/calls/{}", call_id)).await;
    let call = json_body(response).await;
    assert_eq!(call["transcript"]["text"], TRANSCRIPT_TEXT);
    assert!(call["analysis"]["overall_score"].is_u64());
    assert_eq!(call["coaching_plan"]["generated"], true);

    let response = get(&app.router, &format!("/calls/{}/history", call_id)).await;
    let history = json_body(response).await;
    assert_eq!(history.as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn upload_records_the_user_header() {
    let app = test_app().await;
    let user_id = Uuid::new_v4();

    let body = multipart_body("audio", "call.wav", "audio/wav", &wav_bytes());
    let request = Request::builder()
        .method("POST")
        .uri("/calls")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-user-id", user_id.to_string())
        .body(Body::from(body))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let call_id: Uuid = json_body(response).await["call_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    let call = db::calls::get_call(&app.pool, call_id).await.unwrap();
    assert_eq!(call.user_id, Some(user_id));
}

#[tokio::test]
async fn upload_with_invalid_user_header_is_rejected() {
    let app = test_app().await;

    let body = multipart_body("audio", "call.wav", "audio/wav", &wav_bytes());
    let request = Request::builder()
        .method("POST")
        .uri("/calls")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-user-id", "not-a-uuid")
        .body(Body::from(body))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_without_audio_field_is_rejected() {
    let app = test_app().await;

    let body = multipart_body("document", "call.wav", "audio/wav", &wav_bytes());
    let response = app.router.clone().oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("audio"));
}

#[tokio::test]
async fn upload_of_non_audio_content_is_rejected() {
    let app = test_app().await;

    let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    let body = multipart_body("audio", "image.png", "audio/wav", &png);
    let response = app.router.clone().oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_of_empty_file_is_rejected() {
    let app = test_app().await;

    let body = multipart_body("audio", "call.wav", "audio/wav", &[]);
    let response = app.router.clone().oneshot(upload_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_call_returns_not_found() {
    let app = test_app().await;
    let missing = Uuid::new_v4();

    for uri in [
        format!("/calls/{}", missing),
        format!("/calls/{}/status", missing),
        format!("/calls/{}/history", missing),
    ] {
        let response = get(&app.router, &uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {}", uri);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn retry_of_non_errored_call_conflicts() {
    let app = test_app().await;

    // Freshly uploaded record, never run
    let call = CallRecord::new(
        None,
        AudioSource {
            path: "/data/uploads/test.wav".to_string(),
            original_name: "test.wav".to_string(),
            size_bytes: 128,
            mime_type: "audio/wav".to_string(),
        },
    );
    db::calls::save_call(&app.pool, &call).await.unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/calls/{}/retry", call.call_id))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn retry_of_errored_call_is_accepted_and_reruns() {
    let app = test_app().await;

    let mut call = CallRecord::new(
        None,
        AudioSource {
            path: "/data/uploads/test.wav".to_string(),
            original_name: "test.wav".to_string(),
            size_bytes: 128,
            mime_type: "audio/wav".to_string(),
        },
    );
    call.record_failure(
        callscope::models::PipelineStep::Transcribe,
        "TRANSCRIPTION_UNREACHABLE",
        "connection refused".to_string(),
    );
    db::calls::save_call(&app.pool, &call).await.unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/calls/{}/retry", call.call_id))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = json_body(response).await;
    assert_eq!(body["status"], "uploaded");
    assert_eq!(body["previous_attempts"], 1);

    // The mock clients succeed, so the retried run reaches completion
    let mut status = String::new();
    for _ in 0..100 {
        let response = get(&app.router, &format!("/calls/{}/status", call.call_id)).await;
        status = json_body(response).await["status"].as_str().unwrap().to_string();
        if status == "completed" || status == "error" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, "completed");
}
