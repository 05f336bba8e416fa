//! Answer validation.

use crate::models::AnswerMap;
use regex::Regex;

/// Validates raw answers against a domain-specific shape.
pub trait ResultFilter: Send + Sync {
    /// Check a single answer.
    fn is_valid(&self, word: &str, answer: &str) -> bool;

    /// Keep only valid entries. Answers are trimmed before checking and
    /// stored trimmed.
    fn filter(&self, answers: AnswerMap) -> AnswerMap {
        answers
            .into_iter()
            .filter_map(|(word, answer)| {
                let answer = answer.trim();
                self.is_valid(&word, answer)
                    .then(|| (word, answer.to_string()))
            })
            .collect()
    }
}

/// Accepts answers written entirely in katakana.
///
/// The prolonged sound mark `ー` is allowed; it belongs to the Common script
/// rather than Katakana.
#[derive(Debug, Clone)]
pub struct KatakanaFilter {
    pattern: Regex,
}

impl KatakanaFilter {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"^[\p{Katakana}ー]+$").unwrap(),
        }
    }
}

impl Default for KatakanaFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFilter for KatakanaFilter {
    fn is_valid(&self, _word: &str, answer: &str) -> bool {
        self.pattern.is_match(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(&str, &str)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(w, a)| (w.to_string(), a.to_string()))
            .collect()
    }

    #[test]
    fn test_katakana_shapes() {
        let filter = KatakanaFilter::new();
        assert!(filter.is_valid("computer", "コンピューター"));
        assert!(filter.is_valid("tea", "ティー"));
        assert!(!filter.is_valid("tea", ""));
        assert!(!filter.is_valid("tea", "てぃー"));
        assert!(!filter.is_valid("tea", "tea"));
        assert!(!filter.is_valid("tea", "ティー (tea)"));
        assert!(!filter.is_valid("tea", "茶"));
    }

    #[test]
    fn test_filter_keeps_only_valid_and_trims() {
        let filter = KatakanaFilter::new();
        let valid = filter.filter(answers(&[
            ("apple", " アップル "),
            ("banana", "banana"),
            ("cherry", "チェリー"),
            ("date", ""),
        ]));
        assert_eq!(valid.len(), 2);
        assert_eq!(valid["apple"], "アップル");
        assert_eq!(valid["cherry"], "チェリー");
    }
}
