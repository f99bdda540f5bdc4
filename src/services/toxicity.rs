//! Toxicity classification client
//!
//! Politeness is derived as `1 - max(attribute scores)`. Like sentiment,
//! this is an optional dependency: the engine falls back to a fixed default
//! politeness on failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::transcription::USER_AGENT;

/// Fallback politeness (0-1) when the toxicity service is unreachable
pub const FALLBACK_POLITENESS: f64 = 0.8;

/// Toxicity client errors
#[derive(Debug, Error)]
pub enum ToxicityError {
    #[error("network error: {0}")]
    Network(String),

    #[error("toxicity API error {0}: {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Toxicity attribute scores in [0, 1]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToxicityScores {
    pub toxic: f64,
    pub hate: f64,
    pub obscene: f64,
    pub threat: f64,
    pub insult: f64,
}

impl ToxicityScores {
    /// Worst attribute score
    pub fn max_attribute(&self) -> f64 {
        [self.toxic, self.hate, self.obscene, self.threat, self.insult]
            .into_iter()
            .fold(0.0_f64, f64::max)
    }

    /// Politeness derived from attributes: `1 - max(...)`
    pub fn politeness(&self) -> f64 {
        1.0 - self.max_attribute()
    }
}

/// Toxicity service boundary
#[async_trait]
pub trait ToxicityScorer: Send + Sync {
    /// Score a short excerpt (the engine delegates only the opening sentences)
    async fn score(&self, text: &str) -> Result<ToxicityScores, ToxicityError>;
}

/// HTTP toxicity client
pub struct HttpToxicityScorer {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpToxicityScorer {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ToxicityError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ToxicityError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl ToxicityScorer for HttpToxicityScorer {
    async fn score(&self, text: &str) -> Result<ToxicityScores, ToxicityError> {
        let mut request = self
            .http_client
            .post(format!("{}/toxicity", self.base_url))
            .json(&serde_json::json!({ "text": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToxicityError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ToxicityError::Api(status.as_u16(), error_text));
        }

        let scores: ToxicityScores = response
            .json()
            .await
            .map_err(|e| ToxicityError::Parse(e.to_string()))?;

        tracing::debug!(max_attribute = scores.max_attribute(), "Toxicity scored");

        Ok(scores)
    }
}
