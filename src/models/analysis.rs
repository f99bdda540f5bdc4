//! Analysis result types
//!
//! Nine named quality metrics (0-100), each paired with a feedback string,
//! plus free-text observations derived from the same checks.

use serde::{Deserialize, Serialize};

/// One scored quality metric with banded feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricScore {
    /// Score in 0-100
    pub score: u8,
    /// Human-readable feedback for this metric
    pub feedback: String,
}

impl MetricScore {
    pub fn new(score: u8, feedback: impl Into<String>) -> Self {
        Self {
            score,
            feedback: feedback.into(),
        }
    }
}

/// The fixed set of 9 quality metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMetrics {
    /// Professional greeting in the opening sentences
    pub call_opening: MetricScore,
    /// Evidence the agent identified the caller's issue
    pub issue_understanding: MetricScore,
    /// Positive sentiment of the conversation opening
    pub sentiment: MetricScore,
    /// Absence of toxic/hostile language
    pub politeness: MetricScore,
    /// Sentence-length statistics within a readable range
    pub clarity: MetricScore,
    /// Vocabulary richness
    pub engagement: MetricScore,
    /// Issue and resolution vocabulary both present
    pub relevance: MetricScore,
    /// Derived: mean of sentiment, politeness, relevance
    pub csat: MetricScore,
    /// Resolution vocabulary present
    pub resolution_quality: MetricScore,
}

/// Result of the analyze stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAnalysis {
    /// Rounded mean of sentiment, politeness, clarity, engagement, relevance.
    /// The other four metrics are reported but excluded from this aggregate.
    pub overall_score: u8,
    pub metrics: CallMetrics,
    pub key_points: Vec<String>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}
