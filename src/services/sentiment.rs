//! Sentiment classification client
//!
//! Optional dependency of the scoring engine: on failure the engine
//! substitutes the documented fallback constants rather than failing the
//! analyze stage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::transcription::USER_AGENT;

/// Fallback positive score when the sentiment service is unreachable
pub const FALLBACK_POSITIVE: f64 = 0.7;
/// Fallback negative score when the sentiment service is unreachable
pub const FALLBACK_NEGATIVE: f64 = 0.3;

/// Sentiment client errors
#[derive(Debug, Error)]
pub enum SentimentError {
    #[error("network error: {0}")]
    Network(String),

    #[error("sentiment API error {0}: {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Sentiment scores in [0, 1]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SentimentScores {
    pub positive: f64,
    pub negative: f64,
}

impl SentimentScores {
    /// Documented fallback used on service failure
    pub fn fallback() -> Self {
        Self {
            positive: FALLBACK_POSITIVE,
            negative: FALLBACK_NEGATIVE,
        }
    }
}

/// Sentiment service boundary
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    /// Score a short excerpt (the engine delegates only the opening sentences)
    async fn score(&self, text: &str) -> Result<SentimentScores, SentimentError>;
}

/// HTTP sentiment client
pub struct HttpSentimentScorer {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSentimentScorer {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SentimentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SentimentError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl SentimentScorer for HttpSentimentScorer {
    async fn score(&self, text: &str) -> Result<SentimentScores, SentimentError> {
        let mut request = self
            .http_client
            .post(format!("{}/sentiment", self.base_url))
            .json(&serde_json::json!({ "text": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SentimentError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SentimentError::Api(status.as_u16(), error_text));
        }

        let scores: SentimentScores = response
            .json()
            .await
            .map_err(|e| SentimentError::Parse(e.to_string()))?;

        tracing::debug!(
            positive = scores.positive,
            negative = scores.negative,
            "Sentiment scored"
        );

        Ok(scores)
    }
}
