//! Scoring engine
//!
//! Maps a transcript to 9 quality metrics (0-100) plus qualitative feedback.
//! Sentiment and politeness delegate the opening sentences to external
//! classification services, with documented fallback constants on failure;
//! every other metric is a deterministic local heuristic over sentence-length
//! statistics, vocabulary uniqueness, and keyword presence.
//!
//! The engine never fails because a classification service is unreachable;
//! it errors only on an empty or unusable transcript.

use std::sync::Arc;
use thiserror::Error;

use crate::models::{CallAnalysis, CallMetrics, MetricScore};
use crate::services::sentiment::{SentimentScorer, SentimentScores};
use crate::services::toxicity::{ToxicityScorer, FALLBACK_POLITENESS};

/// Greeting vocabulary checked against the opening sentences
const GREETING_KEYWORDS: &[&str] = &[
    "hello",
    "hi",
    "good morning",
    "good afternoon",
    "good evening",
    "welcome",
    "thank you for calling",
];

/// Issue vocabulary signalling the agent engaged with the caller's problem
const ISSUE_KEYWORDS: &[&str] = &[
    "issue",
    "problem",
    "trouble",
    "error",
    "broken",
    "complaint",
    "not working",
    "doesn't work",
    "failed",
];

/// Resolution vocabulary signalling the call reached an outcome
const RESOLUTION_KEYWORDS: &[&str] = &[
    "resolved",
    "fixed",
    "solution",
    "solved",
    "refund",
    "replacement",
    "escalate",
    "follow up",
    "sorted",
];

/// Scoring engine errors
#[derive(Debug, Error)]
pub enum ScoringError {
    /// The transcript is empty after validation; nothing to score
    #[error("transcript is empty, nothing to analyze")]
    EmptyTranscript,
}

impl ScoringError {
    pub fn code(&self) -> &'static str {
        match self {
            ScoringError::EmptyTranscript => "EMPTY_TRANSCRIPT",
        }
    }
}

/// Scoring engine with injected classification clients
pub struct ScoringEngine {
    sentiment: Arc<dyn SentimentScorer>,
    toxicity: Arc<dyn ToxicityScorer>,
}

impl ScoringEngine {
    pub fn new(sentiment: Arc<dyn SentimentScorer>, toxicity: Arc<dyn ToxicityScorer>) -> Self {
        Self { sentiment, toxicity }
    }

    /// Analyze a transcript into the full 9-metric result
    ///
    /// Deterministic for a fixed transcript and fixed external-service
    /// responses.
    pub async fn analyze(&self, transcript_text: &str) -> Result<CallAnalysis, ScoringError> {
        let text = transcript_text.trim();
        if text.is_empty() {
            return Err(ScoringError::EmptyTranscript);
        }

        let lower = text.to_lowercase();
        let sentences = split_sentences(&lower);
        let word_list = words(&lower);

        // Only the opening sentences go to the classification services
        let excerpt = sentences
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join(". ");

        let sentiment_scores = match self.sentiment.score(&excerpt).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "Sentiment service failed, using fallback scores");
                SentimentScores::fallback()
            }
        };
        let politeness_raw = match self.toxicity.score(&excerpt).await {
            Ok(t) => t.politeness(),
            Err(e) => {
                tracing::warn!(error = %e, "Toxicity service failed, using fallback politeness");
                FALLBACK_POLITENESS
            }
        };

        let sentiment = to_score(sentiment_scores.positive);
        let politeness = to_score(politeness_raw);
        let clarity = clarity_score(&sentences);
        let engagement = engagement_score(&word_list);
        let relevance = relevance_score(&lower, &word_list);
        let call_opening = call_opening_score(&sentences);
        let issue_understanding = issue_understanding_score(&lower, &word_list);
        let resolution_quality = resolution_quality_score(&lower, &word_list);

        // CSAT aggregates the caller-facing metrics
        let csat = round_mean(&[sentiment, politeness, relevance]);
        // The overall aggregate excludes call-opening, issue-understanding,
        // csat, and resolution-quality.
        let overall_score = round_mean(&[sentiment, politeness, clarity, engagement, relevance]);

        let metrics = CallMetrics {
            call_opening: MetricScore::new(call_opening, feedback("call opening", call_opening)),
            issue_understanding: MetricScore::new(
                issue_understanding,
                feedback("issue understanding", issue_understanding),
            ),
            sentiment: MetricScore::new(sentiment, feedback("sentiment", sentiment)),
            politeness: MetricScore::new(politeness, feedback("politeness", politeness)),
            clarity: MetricScore::new(clarity, feedback("clarity", clarity)),
            engagement: MetricScore::new(engagement, feedback("engagement", engagement)),
            relevance: MetricScore::new(relevance, feedback("relevance", relevance)),
            csat: MetricScore::new(csat, feedback("customer satisfaction", csat)),
            resolution_quality: MetricScore::new(
                resolution_quality,
                feedback("resolution quality", resolution_quality),
            ),
        };

        let (key_points, issues, recommendations) = qualitative_notes(&lower, &metrics, sentences.len());

        tracing::info!(
            overall_score,
            sentiment,
            politeness,
            clarity,
            engagement,
            relevance,
            "Call analysis computed"
        );

        Ok(CallAnalysis {
            overall_score,
            metrics,
            key_points,
            issues,
            recommendations,
        })
    }
}

/// Convert a [0, 1] service score to a 0-100 metric
fn to_score(raw: f64) -> u8 {
    (raw.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Rounded mean of metric scores
fn round_mean(scores: &[u8]) -> u8 {
    let sum: u32 = scores.iter().map(|&s| s as u32).sum();
    ((sum as f64) / (scores.len() as f64)).round() as u8
}

/// Threshold-banded feedback string for one metric
fn feedback(label: &str, score: u8) -> String {
    if score >= 85 {
        format!("Excellent {}.", label)
    } else if score >= 70 {
        format!("Good {}, with room to improve.", label)
    } else {
        format!("The {} needs improvement.", label)
    }
}

/// Split lowercased text into trimmed, non-empty sentences
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '?', '!'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split lowercased text into words, stripping edge punctuation
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Keyword presence check: phrases by substring, single words by word match
fn contains_keyword(text: &str, word_list: &[String], keyword: &str) -> bool {
    if keyword.contains(' ') {
        text.contains(keyword)
    } else {
        word_list.iter().any(|w| w == keyword)
    }
}

fn count_keywords(text: &str, word_list: &[String], keywords: &[&str]) -> usize {
    keywords
        .iter()
        .filter(|kw| contains_keyword(text, word_list, kw))
        .count()
}

/// Clarity from sentence-length statistics
///
/// Sentences averaging 8-20 words read well on a call; very short sentences
/// suggest fragmented speech, very long ones suggest rambling.
pub(crate) fn clarity_score(sentences: &[String]) -> u8 {
    if sentences.is_empty() {
        return 50;
    }
    let total_words: usize = sentences.iter().map(|s| s.split_whitespace().count()).sum();
    let avg = total_words as f64 / sentences.len() as f64;

    if (8.0..=20.0).contains(&avg) {
        90
    } else if avg < 8.0 {
        72
    } else {
        let penalty = ((avg - 20.0) * 2.0).round() as i64;
        (90 - penalty).clamp(40, 90) as u8
    }
}

/// Engagement from vocabulary-uniqueness ratio
pub(crate) fn engagement_score(word_list: &[String]) -> u8 {
    if word_list.is_empty() {
        return 30;
    }
    let unique: std::collections::HashSet<&str> =
        word_list.iter().map(|w| w.as_str()).collect();
    let ratio = unique.len() as f64 / word_list.len() as f64;
    ((ratio * 140.0).round() as i64).clamp(30, 95) as u8
}

/// Relevance from issue and resolution vocabulary presence
pub(crate) fn relevance_score(text: &str, word_list: &[String]) -> u8 {
    let has_issue = count_keywords(text, word_list, ISSUE_KEYWORDS) > 0;
    let has_resolution = count_keywords(text, word_list, RESOLUTION_KEYWORDS) > 0;
    match (has_issue, has_resolution) {
        (true, true) => 90,
        (true, false) | (false, true) => 70,
        (false, false) => 50,
    }
}

/// Call opening from greeting vocabulary in the first two sentences
pub(crate) fn call_opening_score(sentences: &[String]) -> u8 {
    let opening = sentences
        .iter()
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .join(". ");
    let opening_words = words(&opening);
    if count_keywords(&opening, &opening_words, GREETING_KEYWORDS) > 0 {
        92
    } else {
        60
    }
}

/// Issue understanding from the number of distinct issue keywords
pub(crate) fn issue_understanding_score(text: &str, word_list: &[String]) -> u8 {
    match count_keywords(text, word_list, ISSUE_KEYWORDS) {
        0 => 55,
        1 => 75,
        _ => 90,
    }
}

/// Resolution quality from resolution vocabulary presence
pub(crate) fn resolution_quality_score(text: &str, word_list: &[String]) -> u8 {
    if count_keywords(text, word_list, RESOLUTION_KEYWORDS) > 0 {
        88
    } else {
        58
    }
}

/// Derive key points, issues, and recommendations from the same checks
fn qualitative_notes(
    text: &str,
    metrics: &CallMetrics,
    sentence_count: usize,
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut key_points = Vec::new();
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    let word_list = words(text);

    if metrics.call_opening.score >= 85 {
        key_points.push("Professional greeting at call start".to_string());
    } else {
        issues.push("Call lacked a clear professional greeting".to_string());
        recommendations
            .push("Open every call with a greeting and a company introduction".to_string());
    }

    if count_keywords(text, &word_list, ISSUE_KEYWORDS) > 0 {
        key_points.push("Customer issue acknowledged during the call".to_string());
    } else {
        issues.push("No explicit acknowledgement of the customer's issue".to_string());
        recommendations
            .push("Restate the customer's issue to confirm understanding".to_string());
    }

    if count_keywords(text, &word_list, RESOLUTION_KEYWORDS) > 0 {
        key_points.push("Resolution language used before closing".to_string());
    } else {
        issues.push("Call closed without clear resolution language".to_string());
        recommendations
            .push("Summarize the resolution or the agreed next steps before closing".to_string());
    }

    if metrics.sentiment.score >= 70 {
        key_points.push("Positive conversational tone".to_string());
    }
    if metrics.clarity.score < 70 {
        issues.push("Sentence structure hurt clarity".to_string());
        recommendations.push("Use shorter, more direct sentences".to_string());
    }
    if metrics.politeness.score < 70 {
        issues.push("Language flagged as potentially impolite".to_string());
        recommendations.push("Keep wording courteous even under pressure".to_string());
    }

    if key_points.is_empty() {
        key_points.push(format!("Transcript analyzed across {} sentences", sentence_count));
    }
    if recommendations.is_empty() {
        recommendations.push("Maintain current call handling quality".to_string());
    }

    (key_points, issues, recommendations)
}
