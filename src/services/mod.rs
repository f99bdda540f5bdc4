//! Service layer for callscope
//!
//! External AI clients (speech-to-text, sentiment, toxicity, generation),
//! the scoring engine, the coaching generator, and the pipeline runner.

pub mod coaching;
pub mod generation;
pub mod pipeline;
pub mod scoring;
pub mod sentiment;
pub mod toxicity;
pub mod transcription;

pub use coaching::{CoachingError, CoachingGenerator};
pub use generation::{GenerationError, HttpTextGenerator, TextGenerator};
pub use pipeline::PipelineRunner;
pub use scoring::{ScoringEngine, ScoringError};
pub use sentiment::{HttpSentimentScorer, SentimentError, SentimentScorer, SentimentScores};
pub use toxicity::{HttpToxicityScorer, ToxicityError, ToxicityScorer, ToxicityScores};
pub use transcription::{HttpSpeechToText, SpeechToText, TranscriptionError};
