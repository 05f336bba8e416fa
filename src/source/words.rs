//! Word sources.
//!
//! Reads plain word lists and CMUdict-style pronouncing dictionaries
//! (`WORD  W ER1 D`, variants written as `word(2)`). Only the headword of
//! each line is used.

use crate::models::{KanagenError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, info};

/// Anything that can produce the job's word set.
pub trait WordSource {
    /// Load all words, deduplicated.
    fn words(&self) -> Result<Vec<String>>;
}

/// Word list backed by a local dictionary file.
#[derive(Debug, Clone)]
pub struct DictionaryFile {
    path: PathBuf,
}

impl DictionaryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Extract the headword of a dictionary line, if it carries one.
    fn headword(line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(";;;") || line.starts_with('#') {
            return None;
        }

        let token = line.split_whitespace().next()?;
        // word(2) marks an alternate pronunciation of the same word
        let token = match token.find('(') {
            Some(idx) => &token[..idx],
            None => token,
        };

        if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        Some(token.to_ascii_lowercase())
    }
}

impl WordSource for DictionaryFile {
    fn words(&self) -> Result<Vec<String>> {
        let file = File::open(&self.path).map_err(|e| KanagenError::io("opening word list", e))?;
        let reader = BufReader::new(file);

        let mut seen = HashSet::new();
        let mut words = Vec::new();
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line.map_err(|e| KanagenError::io("reading word list", e))?;
            match Self::headword(&line) {
                Some(word) => {
                    if seen.insert(word.clone()) {
                        words.push(word);
                    }
                }
                None => skipped += 1,
            }
        }

        debug!(skipped, "Skipped word list lines");
        info!(count = words.len(), path = %self.path.display(), "Loaded words");
        Ok(words)
    }
}

/// Shuffle and keep at most `limit` words, or keep all words as loaded.
pub fn select_words(words: Vec<String>, limit: Option<usize>, rng: &mut StdRng) -> Vec<String> {
    match limit {
        Some(limit) => {
            info!(limit, "Shuffling and limiting words");
            let mut words = words;
            words.shuffle(rng);
            words.truncate(limit);
            words
        }
        None => words,
    }
}
