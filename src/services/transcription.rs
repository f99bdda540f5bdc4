//! Speech-to-text client
//!
//! The transcription stage's only dependency, and the pipeline's only hard
//! external dependency: any failure here aborts the run. Responses are parsed
//! into typed models at the client boundary.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Transcript, TranscriptSegment};

/// User agent shared by all external AI clients
pub(crate) const USER_AGENT: &str = concat!("callscope/", env!("CARGO_PKG_VERSION"));

/// Speech-to-text client errors
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("failed to read audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("transcription API error {0}: {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("transcription returned empty text")]
    EmptyTranscript,

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

impl TranscriptionError {
    /// Stable failure code recorded on the call record
    pub fn code(&self) -> &'static str {
        match self {
            TranscriptionError::Io(_) => "AUDIO_READ_FAILED",
            TranscriptionError::Network(_) => "TRANSCRIPTION_UNREACHABLE",
            TranscriptionError::Api(..) => "TRANSCRIPTION_API_ERROR",
            TranscriptionError::Parse(_) => "TRANSCRIPTION_PARSE_ERROR",
            TranscriptionError::EmptyTranscript => "EMPTY_TRANSCRIPT",
            TranscriptionError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
        }
    }
}

/// Speech-to-text service boundary
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe the audio file at `audio_path`
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, TranscriptionError>;
}

/// Transcription API response payload
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    segments: Vec<SegmentPayload>,
    language: Option<String>,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SegmentPayload {
    id: u32,
    start: f64,
    end: f64,
    text: String,
}

/// HTTP speech-to-text client
pub struct HttpSpeechToText {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSpeechToText {
    /// Create client with a fixed request timeout
    ///
    /// Transcription is the slow call of the pipeline; the timeout is tens of
    /// seconds where the classification clients use single digits.
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TranscriptionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechToText {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript, TranscriptionError> {
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let bytes = tokio::fs::read(audio_path).await?;

        tracing::debug!(
            path = %audio_path.display(),
            size_bytes = bytes.len(),
            "Submitting audio for transcription"
        );

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut request = self
            .http_client
            .post(format!("{}/transcribe", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TranscriptionError::Network(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 415 {
            let detail = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::UnsupportedFormat(detail));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Api(status.as_u16(), error_text));
        }

        let payload: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Parse(e.to_string()))?;

        if payload.text.trim().is_empty() {
            return Err(TranscriptionError::EmptyTranscript);
        }

        tracing::info!(
            chars = payload.text.len(),
            segments = payload.segments.len(),
            language = payload.language.as_deref().unwrap_or("unknown"),
            "Transcription successful"
        );

        Ok(Transcript {
            text: payload.text,
            segments: payload
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    id: s.id,
                    start: s.start,
                    end: s.end,
                    text: s.text,
                })
                .collect(),
            language: payload.language,
            confidence: payload.confidence,
        })
    }
}
