//! Configuration models for kanagen.
//!
//! Every tunable of a run is parameterized here and resolved at runtime
//! from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for kanagen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seed for word shuffling and probe sampling (absent = OS entropy)
    #[serde(default)]
    pub random_seed: Option<u64>,

    /// Word list settings
    pub source: SourceConfig,

    /// Inference backend and collection settings
    pub inference: InferenceConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Word list configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the word list (plain or CMUdict format)
    pub path: PathBuf,

    /// Shuffle and keep at most this many words (absent = all)
    #[serde(default)]
    pub max_num_words: Option<usize>,
}

/// Inference configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Backend to drive
    #[serde(default)]
    pub provider: Provider,

    /// Maximum number of in-flight backend calls
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Batch size selection
    pub batch: BatchConfig,

    /// Throttling and retry policy
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Settings for the dummy backend
    #[serde(default)]
    pub dummy: DummyConfig,
}

fn default_concurrency() -> usize {
    4
}

/// Available inference backends.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Deterministic in-process backend
    #[default]
    Dummy,
}

/// Batch size selection mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BatchConfig {
    /// Use a statically configured batch size
    Fixed { batch_size: usize },

    /// Discover the backend's capacity by bisection, then scale it down
    Bisect {
        #[serde(default = "default_max_batch_size")]
        max_batch_size: usize,

        #[serde(default = "default_ratio")]
        ratio: f64,
    },
}

fn default_max_batch_size() -> usize {
    500
}

fn default_ratio() -> f64 {
    0.8
}

/// Throttling and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Fixed delay before every backend call (milliseconds)
    #[serde(default)]
    pub throttle_ms: u64,

    /// Backoff after a rate-limited round (milliseconds)
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,

    /// Rounds allowed to fail before the run is abandoned
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_wait_ms() -> u64 {
    60_000
}

fn default_max_retries() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 0,
            wait_ms: default_wait_ms(),
            max_retries: default_max_retries(),
        }
    }
}

/// Dummy backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DummyConfig {
    /// Maximum number of words answered per call
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Simulated call latency (milliseconds)
    #[serde(default)]
    pub latency_ms: u64,
}

fn default_capacity() -> usize {
    200
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            latency_ms: 0,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Dataset file path (JSON Lines)
    pub path: PathBuf,

    /// Whether to draw a progress bar while collecting
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inference.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "inference.concurrency must be at least 1".to_string(),
            ));
        }

        match self.inference.batch {
            BatchConfig::Fixed { batch_size } if batch_size == 0 => {
                return Err(ConfigError::Invalid(
                    "inference.batch.batch_size must be at least 1".to_string(),
                ));
            }
            BatchConfig::Bisect { max_batch_size, .. } if max_batch_size == 0 => {
                return Err(ConfigError::Invalid(
                    "inference.batch.max_batch_size must be at least 1".to_string(),
                ));
            }
            BatchConfig::Bisect { ratio, .. } if !(ratio > 0.0 && ratio <= 1.0) => {
                return Err(ConfigError::Invalid(format!(
                    "inference.batch.ratio must be in (0, 1], got {ratio}"
                )));
            }
            _ => {}
        }

        if self.inference.provider == Provider::Dummy && self.inference.dummy.capacity == 0 {
            return Err(ConfigError::Invalid(
                "inference.dummy.capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
