//! Data models for callscope

mod analysis;
mod call;
mod coaching;

pub use analysis::{CallAnalysis, CallMetrics, MetricScore};
pub use call::{
    AudioSource, CallFailure, CallRecord, CallStatus, HistoryEntry, PerformanceMetrics,
    PipelineStep, StatusTransition, StepStatus, Transcript, TranscriptSegment,
};
pub use coaching::{CoachingPlan, Priority, QuizItem, Recommendation, Resource};
