//! Retrying concurrent collection loop.
//!
//! Round flow:
//! Remaining words → Batches → Backend calls (limited, throttled) → Filter → Merge
//!
//! Every round re-requests only words without a valid answer. Batches of a
//! round fail independently; a round is retried after a backoff when every
//! failure in it was a rate limit, and aborts the run on any other failure.

use crate::backend::{InferenceBackend, InferenceResult, ResultFilter};
use crate::models::{AnswerMap, InferenceError, KanagenError, RateLimitConfig, Result, RunStats};
use crate::pool::ConcurrencyLimiter;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Throttling and retry policy for a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before every backend call
    pub throttle: Duration,
    /// Sleep after a rate-limited round
    pub backoff: Duration,
    /// Failed rounds tolerated before giving up
    pub max_retries: u32,
}

impl From<&RateLimitConfig> for RetryPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            throttle: Duration::from_millis(config.throttle_ms),
            backoff: Duration::from_millis(config.wait_ms),
            max_retries: config.max_retries,
        }
    }
}

/// Summary of one collection round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// 1-based round number
    pub round: u32,
    /// Backend calls issued
    pub batches: usize,
    /// Words requested across all batches
    pub requested: usize,
    /// Words newly resolved
    pub resolved: usize,
    /// Requested words answered missing or invalid by successful batches
    pub invalid: usize,
    /// Batches that failed
    pub failed_batches: usize,
    /// Resolved words after the round
    pub total_resolved: usize,
}

/// Outcome of a successful collection.
#[derive(Debug, Clone)]
pub struct Collection {
    /// Valid answer for every word of the job
    pub results: AnswerMap,
    /// Per-round summaries, in order
    pub rounds: Vec<RoundReport>,
    /// Aggregate statistics
    pub stats: RunStats,
}

/// Drives an inference backend until every word has a valid answer.
pub struct RetryingCollector {
    backend: Arc<dyn InferenceBackend>,
    filter: Arc<dyn ResultFilter>,
    limiter: ConcurrencyLimiter,
    batch_size: usize,
    policy: RetryPolicy,
    show_progress: bool,
}

impl RetryingCollector {
    /// Create a new collector.
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        filter: Arc<dyn ResultFilter>,
        limiter: ConcurrencyLimiter,
        batch_size: usize,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            filter,
            limiter,
            batch_size,
            policy,
            show_progress: false,
        }
    }

    /// Draw a progress bar over resolved words.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, total: usize) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                .map_err(|e| KanagenError::Internal(format!("Invalid progress template: {e}")))?
                .progress_chars("##-"),
        );
        Ok(pb)
    }

    /// Collect a valid answer for every word.
    ///
    /// Duplicate words are collected once. Fails with `BackendFailed` as soon
    /// as a round sees a non-rate-limit failure, and with
    /// `RetryBudgetExhausted` once failed rounds exceed the policy's maximum.
    pub async fn collect(&self, words: &[String]) -> Result<Collection> {
        if self.batch_size == 0 {
            return Err(KanagenError::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }

        let start = Instant::now();

        let mut seen = HashSet::with_capacity(words.len());
        let words: Vec<&String> = words.iter().filter(|&w| seen.insert(w.as_str())).collect();
        let total = words.len();

        info!(
            total_words = total,
            batch_size = self.batch_size,
            concurrency = self.limiter.capacity(),
            backend = self.backend.name(),
            "Starting collection"
        );

        let pb = self.progress_bar(total)?;

        // Sole owner of collected answers; only merged into below.
        let mut results = AnswerMap::with_capacity(total);
        let mut rounds = Vec::new();
        let mut stats = RunStats {
            total_words: total,
            batch_size: self.batch_size,
            ..Default::default()
        };
        let mut retries = 0u32;

        loop {
            let remaining: Vec<String> = words
                .iter()
                .filter(|w| !results.contains_key(w.as_str()))
                .map(|w| (*w).clone())
                .collect();

            if remaining.is_empty() {
                break;
            }

            stats.rounds += 1;
            let mut report = RoundReport {
                round: stats.rounds,
                requested: remaining.len(),
                ..Default::default()
            };

            let handles: Vec<_> = remaining
                .chunks(self.batch_size)
                .map(|chunk| self.dispatch(chunk.to_vec()))
                .collect();
            report.batches = handles.len();
            stats.batches_dispatched += handles.len();

            info!(
                round = report.round,
                batches = report.batches,
                remaining = remaining.len(),
                "Waiting for batches"
            );

            let mut failures = Vec::new();

            for handle in handles {
                let (batch, outcome) = match handle.await {
                    Ok(joined) => joined,
                    Err(e) => {
                        warn!(round = report.round, error = %e, "Batch task panicked");
                        failures.push(InferenceError::Unavailable(format!(
                            "batch task panicked: {e}"
                        )));
                        continue;
                    }
                };

                let raw = match outcome {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(
                            round = report.round,
                            words = batch.len(),
                            error = %e,
                            "Batch failed"
                        );
                        failures.push(e);
                        continue;
                    }
                };

                let raw_count = raw.len();
                let requested: HashSet<&str> = batch.iter().map(String::as_str).collect();
                let mut accepted = 0usize;

                for (word, answer) in self.filter.filter(raw) {
                    // Unrequested entries are backend noise
                    if requested.contains(word.as_str()) {
                        results.insert(word, answer);
                        accepted += 1;
                    }
                }

                let invalid = batch.len() - accepted;
                report.resolved += accepted;
                report.invalid += invalid;
                stats.raw_answers += raw_count;
                stats.valid_answers += accepted;
                stats.invalid_answers += invalid;

                pb.set_position(results.len() as u64);
                debug!(
                    round = report.round,
                    raw = raw_count,
                    valid = accepted,
                    invalid,
                    remaining = total - results.len(),
                    "Batch merged"
                );
            }

            report.failed_batches = failures.len();
            report.total_resolved = results.len();
            pb.set_message(format!("round {}, retries {}", report.round, retries));

            info!(
                round = report.round,
                resolved = report.resolved,
                invalid = report.invalid,
                failed_batches = report.failed_batches,
                remaining = total - results.len(),
                "Round complete"
            );

            let made_progress = report.resolved > 0;
            rounds.push(report);

            if failures.is_empty() {
                if made_progress {
                    continue;
                }
                retries += 1;
                warn!(retries, "Round resolved no new words");
                if retries > self.policy.max_retries {
                    pb.abandon();
                    return Err(KanagenError::RetryBudgetExhausted {
                        retries,
                        max_retries: self.policy.max_retries,
                    });
                }
                continue;
            }

            if failures.iter().any(|e| !e.is_rate_limited()) {
                pb.abandon();
                return Err(KanagenError::BackendFailed { errors: failures });
            }

            stats.rate_limited_rounds += 1;
            retries += 1;
            if retries > self.policy.max_retries {
                pb.abandon();
                return Err(KanagenError::RetryBudgetExhausted {
                    retries,
                    max_retries: self.policy.max_retries,
                });
            }

            warn!(
                retries,
                rate_limited_batches = failures.len(),
                wait_ms = self.policy.backoff.as_millis() as u64,
                "Rate limited, backing off"
            );
            tokio::time::sleep(self.policy.backoff).await;
        }

        pb.finish_with_message(format!("Done! {} words resolved", results.len()));

        stats.resolved_words = results.len();
        stats.runtime_secs = start.elapsed().as_secs_f64();
        stats.finalize();

        info!(
            resolved = stats.resolved_words,
            rounds = stats.rounds,
            batches = stats.batches_dispatched,
            rate_limited_rounds = stats.rate_limited_rounds,
            "Collection complete"
        );

        Ok(Collection {
            results,
            rounds,
            stats,
        })
    }

    /// Spawn one throttled backend call under the limiter.
    fn dispatch(
        &self,
        batch: Vec<String>,
    ) -> tokio::task::JoinHandle<(Vec<String>, InferenceResult)> {
        let backend = Arc::clone(&self.backend);
        let limiter = self.limiter.clone();
        let throttle = self.policy.throttle;

        tokio::spawn(async move {
            let outcome = limiter
                .run(async {
                    if !throttle.is_zero() {
                        tokio::time::sleep(throttle).await;
                    }
                    backend.infer(&batch).await
                })
                .await
                .unwrap_or_else(|e| Err(InferenceError::Unavailable(e.to_string())));
            (batch, outcome)
        })
    }
}
