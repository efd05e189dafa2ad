use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub transcripts: TranscriptConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub aggregates: AggregatesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Export directories scanned per source kind. A missing entry simply means
/// that source is never synced.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    pub twitter: Option<SourceDirConfig>,
    pub youtube: Option<SourceDirConfig>,
    pub github: Option<SourceDirConfig>,
    pub sessions: Option<SourceDirConfig>,
    pub transcripts: Option<SourceDirConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceDirConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub include_globs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Long pause after a 429 from the provider. Minutes-scale, unlike the
    /// exponential schedule used for 5xx.
    #[serde(default = "default_rate_limit_delay_secs")]
    pub rate_limit_delay_secs: u64,
    /// Fixed sleep between backfill groups.
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            rate_limit_delay_secs: 120,
            inter_batch_delay_ms: 500,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_rate_limit_delay_secs() -> u64 {
    120
}
fn default_inter_batch_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptConfig {
    /// Transcripts longer than this get windowed; shorter ones are stored
    /// whole.
    #[serde(default = "default_chunk_threshold_secs")]
    pub chunk_threshold_secs: f64,
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            chunk_threshold_secs: default_chunk_threshold_secs(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_chunk_threshold_secs() -> f64 {
    600.0
}
fn default_window_secs() -> f64 {
    120.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_final_limit")]
    pub final_limit: i64,
    /// Semantic mode fetches this multiple of the limit before structured
    /// filters are applied.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
            overfetch_factor: default_overfetch_factor(),
        }
    }
}

fn default_final_limit() -> i64 {
    12
}
fn default_overfetch_factor() -> i64 {
    2
}

/// Per-unit effort weights for the daily aggregate's estimated-minutes
/// figure.
#[derive(Debug, Deserialize, Clone)]
pub struct AggregatesConfig {
    #[serde(default = "default_minutes_per_session")]
    pub minutes_per_session: i64,
    #[serde(default = "default_minutes_per_commit")]
    pub minutes_per_commit: i64,
    #[serde(default = "default_minutes_per_issue")]
    pub minutes_per_issue: i64,
    #[serde(default = "default_minutes_per_pr")]
    pub minutes_per_pr: i64,
}

impl Default for AggregatesConfig {
    fn default() -> Self {
        Self {
            minutes_per_session: default_minutes_per_session(),
            minutes_per_commit: default_minutes_per_commit(),
            minutes_per_issue: default_minutes_per_issue(),
            minutes_per_pr: default_minutes_per_pr(),
        }
    }
}

fn default_minutes_per_session() -> i64 {
    30
}
fn default_minutes_per_commit() -> i64 {
    15
}
fn default_minutes_per_issue() -> i64 {
    10
}
fn default_minutes_per_pr() -> i64 {
    20
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }
    if config.retrieval.overfetch_factor < 1 {
        anyhow::bail!("retrieval.overfetch_factor must be >= 1");
    }
    if config.transcripts.window_secs <= 0.0 {
        anyhow::bail!("transcripts.window_secs must be > 0");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "voyage" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or voyage.",
            other
        ),
    }

    Ok(config)
}
