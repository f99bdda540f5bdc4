//! callscope - Call Analysis Service
//!
//! Accepts call-recording uploads, runs each through the
//! transcribe → analyze → coach pipeline, and serves results plus real-time
//! progress over HTTP REST + SSE.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use callscope::config::Config;
use callscope::events::EventBus;
use callscope::services::{
    CoachingGenerator, HttpSentimentScorer, HttpSpeechToText, HttpTextGenerator,
    HttpToxicityScorer, PipelineRunner, ScoringEngine,
};
use callscope::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting callscope (Call Analysis) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load()?);

    // Ensure storage directories exist before accepting uploads
    std::fs::create_dir_all(config.storage.upload_dir())?;

    let db_path = config.storage.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = callscope::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    // External AI clients, each with its configured endpoint and timeout
    let speech_to_text = Arc::new(HttpSpeechToText::new(
        config.speech_to_text.base_url.clone(),
        config.speech_to_text.api_key.clone(),
        config.speech_to_text.timeout(),
    )?);
    let sentiment = Arc::new(HttpSentimentScorer::new(
        config.sentiment.base_url.clone(),
        config.sentiment.api_key.clone(),
        config.sentiment.timeout(),
    )?);
    let toxicity = Arc::new(HttpToxicityScorer::new(
        config.toxicity.base_url.clone(),
        config.toxicity.api_key.clone(),
        config.toxicity.timeout(),
    )?);
    let generation = Arc::new(HttpTextGenerator::new(
        config.generation.base_url.clone(),
        config.generation.api_key.clone(),
        config.generation.timeout(),
    )?);

    let scoring = ScoringEngine::new(sentiment, toxicity);
    let coaching = CoachingGenerator::new(generation);
    let runner = Arc::new(PipelineRunner::new(
        db_pool.clone(),
        event_bus.clone(),
        speech_to_text,
        scoring,
        coaching,
    ));

    let state = AppState::new(db_pool, event_bus, runner, Arc::clone(&config));
    let app = callscope::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
