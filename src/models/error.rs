//! Error types for kanagen.
//!
//! Taxonomy:
//! - Expected failures: bad input, bad configuration, unusable batch size
//! - Backend failures: rate limiting (recoverable per round), everything else (fatal)
//! - Invariant violations: internal bugs

use thiserror::Error;

/// Top-level error type for kanagen.
#[derive(Debug, Error)]
pub enum KanagenError {
    // ═══════════════════════════════════════════════════════════════════
    // EXPECTED — input or configuration makes the run impossible
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No satisfying batch size found in [{low}, {high}]")]
    SearchExhausted { low: usize, high: usize },

    #[error("Batch size too small: {batch_size} (minimum {minimum})")]
    BatchSizeTooSmall { batch_size: usize, minimum: usize },

    // ═══════════════════════════════════════════════════════════════════
    // BACKEND — the inference backend could not be driven to completion
    // ═══════════════════════════════════════════════════════════════════

    #[error("{} batch call(s) failed: {}", .errors.len(), join_errors(.errors))]
    BackendFailed { errors: Vec<InferenceError> },

    #[error("Too many retries: {retries} exceeds maximum of {max_retries}")]
    RetryBudgetExhausted { retries: u32, max_retries: u32 },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // INVARIANT — should not happen
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a single backend call.
///
/// Only `RateLimited` is considered transient; the collector treats every
/// other variant as a defect that retrying will not fix.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl InferenceError {
    /// Rate limited with the given message.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Generic API failure with the given message.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Check if this failure is a rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl KanagenError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

fn join_errors(errors: &[InferenceError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for kanagen.
pub type Result<T> = std::result::Result<T, KanagenError>;
