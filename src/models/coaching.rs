//! Coaching plan types
//!
//! Fixed-shape output of the coaching stage. The three lists are guaranteed
//! non-empty by the generator's own validation.

use serde::{Deserialize, Serialize};

/// Recommendation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One coaching recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    /// Skill area (e.g. "communication", "process")
    pub category: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

/// One learning resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Resource kind (e.g. "article", "video", "course")
    pub kind: String,
    pub title: String,
    pub description: String,
    pub url: String,
}

/// One quiz item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizItem {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`
    pub correct_answer: usize,
    pub explanation: String,
}

/// Result of the coaching stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachingPlan {
    /// Whether plan generation completed (always true for returned plans)
    pub generated: bool,
    /// Feedback summary selected by overall-score tier
    pub feedback: String,
    pub recommendations: Vec<Recommendation>,
    pub resources: Vec<Resource>,
    pub quiz: Vec<QuizItem>,
    /// What the agent must do to complete this plan
    pub completion_criteria: String,
}
