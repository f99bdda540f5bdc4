//! Configuration resolution for callscope
//!
//! Priority per setting: environment variable → TOML config file → default.
//! The config file path itself comes from `CALLSCOPE_CONFIG` (default
//! `callscope.toml` in the working directory); a missing file means defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

fn default_bind_addr() -> String {
    "127.0.0.1:5760".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_max_upload_bytes() -> u64 {
    // 50 MiB is generous for a single compressed call recording
    50 * 1024 * 1024
}

/// One external AI service endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEndpoint {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl ServiceEndpoint {
    fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: None,
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Upload and database storage settings
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("callscope.db")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "Config::default_speech_to_text")]
    pub speech_to_text: ServiceEndpoint,
    #[serde(default = "Config::default_sentiment")]
    pub sentiment: ServiceEndpoint,
    #[serde(default = "Config::default_toxicity")]
    pub toxicity: ServiceEndpoint,
    #[serde(default = "Config::default_generation")]
    pub generation: ServiceEndpoint,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            storage: StorageConfig::default(),
            speech_to_text: Self::default_speech_to_text(),
            sentiment: Self::default_sentiment(),
            toxicity: Self::default_toxicity(),
            generation: Self::default_generation(),
        }
    }
}

impl Config {
    // Transcription is the slow call; classification calls stay short
    fn default_speech_to_text() -> ServiceEndpoint {
        ServiceEndpoint::new("http://127.0.0.1:9000", 60)
    }

    fn default_sentiment() -> ServiceEndpoint {
        ServiceEndpoint::new("http://127.0.0.1:9001", 5)
    }

    fn default_toxicity() -> ServiceEndpoint {
        ServiceEndpoint::new("http://127.0.0.1:9002", 5)
    }

    fn default_generation() -> ServiceEndpoint {
        ServiceEndpoint::new("http://127.0.0.1:9003", 10)
    }

    /// Load configuration with ENV → TOML → default priority
    pub fn load() -> Result<Self> {
        let path = std::env::var("CALLSCOPE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("callscope.toml"));

        let mut config = Self::load_file(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        } else {
            info!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Ok(Config::default())
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("CALLSCOPE_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("CALLSCOPE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }

        for (var, endpoint) in [
            ("CALLSCOPE_STT_API_KEY", &mut self.speech_to_text),
            ("CALLSCOPE_SENTIMENT_API_KEY", &mut self.sentiment),
            ("CALLSCOPE_TOXICITY_API_KEY", &mut self.toxicity),
            ("CALLSCOPE_GENERATION_API_KEY", &mut self.generation),
        ] {
            if let Ok(key) = std::env::var(var) {
                if key.trim().is_empty() {
                    warn!("{} is set but empty, ignoring", var);
                } else {
                    endpoint.api_key = Some(key);
                }
            }
        }
    }
}
