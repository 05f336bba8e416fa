//! Record and statistics types for kanagen.
//!
//! A word is an opaque string identity; answers travel as plain
//! word → answer maps between the backend, the filter and the collector.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mapping from word to answer text.
///
/// Used both for raw backend output and for filtered, valid answers.
pub type AnswerMap = HashMap<String, String>;

/// One line of the output dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// The source word
    pub word: String,

    /// Accepted pronunciations (one per collected answer)
    pub kata: Vec<String>,
}

impl DatasetRecord {
    /// Build a record from a single accepted answer.
    pub fn new(word: impl Into<String>, pronunciation: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            kata: vec![pronunciation.into()],
        }
    }
}

/// Statistics for a collection run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Words in the job
    pub total_words: usize,

    /// Words with a valid answer at the end of the run
    pub resolved_words: usize,

    /// Batch size the collector ran with
    pub batch_size: usize,

    /// Collection rounds started
    pub rounds: u32,

    /// Backend calls issued by the collector
    pub batches_dispatched: usize,

    /// Entries returned by the backend, before filtering
    pub raw_answers: usize,

    /// Entries that passed the filter
    pub valid_answers: usize,

    /// Requested words that came back missing or invalid
    pub invalid_answers: usize,

    /// Rounds that ended in rate limiting
    pub rate_limited_rounds: u32,

    /// Total runtime in seconds
    pub runtime_secs: f64,

    /// Resolved words per hour
    pub throughput_per_hour: f64,
}

impl RunStats {
    /// Calculate derived stats.
    pub fn finalize(&mut self) {
        if self.runtime_secs > 0.0 {
            self.throughput_per_hour = self.resolved_words as f64 / self.runtime_secs * 3600.0;
        }
    }

    /// Fraction of requested words that came back valid.
    pub fn acceptance_rate(&self) -> f64 {
        let requested = self.valid_answers + self.invalid_answers;
        if requested == 0 {
            return 0.0;
        }
        self.valid_answers as f64 / requested as f64
    }
}
