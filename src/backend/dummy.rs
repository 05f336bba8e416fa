//! Deterministic in-process backend.
//!
//! Answers every requested word with a letter-by-letter katakana rendering,
//! up to a fixed per-call capacity. Words beyond the capacity are silently
//! dropped, which is exactly the behavior batch size discovery probes for.

use crate::backend::{InferenceBackend, InferenceResult};
use crate::models::{AnswerMap, DummyConfig};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Backend that never talks to the network.
#[derive(Debug)]
pub struct DummyBackend {
    capacity: usize,
    latency: Duration,
    total_calls: AtomicU64,
}

impl DummyBackend {
    /// Create a backend answering at most `capacity` words per call.
    pub fn new(capacity: usize, latency: Duration) -> Self {
        Self {
            capacity,
            latency,
            total_calls: AtomicU64::new(0),
        }
    }

    /// Build from configuration.
    pub fn from_config(config: &DummyConfig) -> Self {
        Self::new(config.capacity, Duration::from_millis(config.latency_ms))
    }

    /// Number of calls served so far.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// Render a word in katakana, one character per letter.
    pub fn transliterate(word: &str) -> String {
        let rendered: String = word
            .chars()
            .filter_map(|c| match c.to_ascii_lowercase() {
                'a' => Some('ア'),
                'b' => Some('ブ'),
                'c' | 'k' | 'q' => Some('ク'),
                'd' => Some('ド'),
                'e' => Some('エ'),
                'f' => Some('フ'),
                'g' => Some('グ'),
                'h' => Some('ハ'),
                'i' | 'y' => Some('イ'),
                'j' => Some('ジ'),
                'l' | 'r' => Some('ル'),
                'm' => Some('ム'),
                'n' => Some('ン'),
                'o' => Some('オ'),
                'p' => Some('プ'),
                's' | 'x' => Some('ス'),
                't' => Some('ト'),
                'u' | 'w' => Some('ウ'),
                'v' => Some('ヴ'),
                'z' => Some('ズ'),
                _ => None,
            })
            .collect();

        if rendered.is_empty() {
            "ー".to_string()
        } else {
            rendered
        }
    }
}

#[async_trait]
impl InferenceBackend for DummyBackend {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn infer(&self, words: &[String]) -> InferenceResult {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let answers: AnswerMap = words
            .iter()
            .take(self.capacity)
            .map(|word| (word.clone(), Self::transliterate(word)))
            .collect();

        debug!(
            requested = words.len(),
            answered = answers.len(),
            "Dummy backend answered"
        );

        Ok(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{KatakanaFilter, ResultFilter};

    fn words(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("word{}", char::from(b'a' + (i % 26) as u8))).collect()
    }

    #[test]
    fn test_transliteration_is_valid_katakana() {
        let filter = KatakanaFilter::new();
        for word in ["hello", "queue", "xylophone", "zz", "a"] {
            let kata = DummyBackend::transliterate(word);
            assert!(filter.is_valid(word, &kata), "{word} -> {kata}");
        }
        assert_eq!(DummyBackend::transliterate("cat"), "クアト");
        assert_eq!(DummyBackend::transliterate("'"), "ー");
    }

    #[tokio::test]
    async fn test_answers_up_to_capacity() {
        let backend = DummyBackend::new(3, Duration::ZERO);
        let request: Vec<String> = ["one", "two", "three", "four", "five"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let answers = backend.infer(&request).await.unwrap();
        assert_eq!(answers.len(), 3);
        assert!(answers.contains_key("one"));
        assert!(answers.contains_key("three"));
        assert!(!answers.contains_key("four"));

        let answers = backend.infer(&words(2)).await.unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(backend.total_calls(), 2);
    }
}
