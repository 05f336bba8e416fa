//! Concurrency limiter for backend calls.
//!
//! A counting permit pool: at most `capacity` tasks run under it at once.
//! The permit is held for the lifetime of the task future and released when
//! it completes, fails, panics or is dropped.

use crate::models::{KanagenError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::trace;

/// Bounds the number of in-flight tasks.
///
/// Cloning is cheap; clones share the same permits.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    /// Semaphore for concurrency control
    semaphore: Arc<Semaphore>,
    /// Maximum concurrent tasks
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` permits.
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Maximum number of concurrent tasks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a permit, then run `task` while holding it.
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| KanagenError::Internal("Semaphore closed".to_string()))?;

        trace!(available = self.semaphore.available_permits(), "Permit acquired");
        Ok(task.await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_exceeds_capacity() {
        let limiter = ConcurrencyLimiter::new(3);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                limiter
                    .run(async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak}");
        assert!(peak >= 1);
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test]
    async fn test_permit_released_on_failure() {
        let limiter = ConcurrencyLimiter::new(1);

        let result: Result<std::result::Result<(), &str>> =
            limiter.run(async { Err("boom") }).await;
        assert_eq!(result.unwrap(), Err("boom"));
        assert_eq!(limiter.available(), 1);

        let value = limiter.run(async { 42 }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_permit_released_on_panic() {
        let limiter = ConcurrencyLimiter::new(2);

        let panicking = limiter.clone();
        let handle = tokio::spawn(async move {
            panicking
                .run(async {
                    let failed = true;
                    assert!(!failed, "task failed");
                })
                .await
        });
        assert!(handle.await.is_err());
        assert_eq!(limiter.available(), 2);
    }
}
