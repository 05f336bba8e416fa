//! Integer bisection over an expensive, possibly noisy probe.

use crate::models::{KanagenError, Result};
use std::future::Future;
use tracing::debug;

/// Find the largest value in `[low, high]` for which `probe` succeeds.
///
/// The probe is assumed to hold on some prefix `[low, k]` and fail beyond
/// it. Each point is probed at most once, `O(log(high - low))` probes in
/// total. A noisy probe only shifts the answer; it never stalls the search.
///
/// Fails with `SearchExhausted` when no probed point succeeds.
pub async fn find_max_satisfying<F, Fut>(low: usize, high: usize, mut probe: F) -> Result<usize>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = bool>,
{
    if low == 0 || low > high {
        return Err(KanagenError::InvalidInput(format!(
            "bisection range [{low}, {high}] must satisfy 1 <= low <= high"
        )));
    }

    let mut lo = low;
    let mut hi = high;
    let mut best = None;

    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let ok = probe(mid).await;
        debug!(mid, ok, lo, hi, "Bisection probe");

        if ok {
            best = Some(mid);
            lo = mid + 1;
        } else {
            // mid >= low >= 1, so this cannot underflow
            hi = mid - 1;
        }
    }

    best.ok_or(KanagenError::SearchExhausted { low, high })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::future::ready;

    async fn search_with_threshold(
        low: usize,
        high: usize,
        k: usize,
    ) -> (Result<usize>, Vec<usize>) {
        let mut probed = Vec::new();
        let result = find_max_satisfying(low, high, |n| {
            probed.push(n);
            ready(n <= k)
        })
        .await;
        (result, probed)
    }

    #[tokio::test]
    async fn test_finds_threshold_exactly() {
        for high in [1usize, 2, 3, 10, 17, 64, 100, 1000] {
            for k in 1..=high.min(70) {
                let (result, _) = search_with_threshold(1, high, k).await;
                assert_eq!(result.unwrap(), k, "high={high} k={k}");
            }
        }
    }

    #[tokio::test]
    async fn test_probe_count_is_logarithmic_without_repeats() {
        let (result, probed) = search_with_threshold(1, 1000, 437).await;
        assert_eq!(result.unwrap(), 437);
        // ceil(log2(1000)) + 1
        assert!(probed.len() <= 11, "{} probes", probed.len());

        let unique: HashSet<_> = probed.iter().collect();
        assert_eq!(unique.len(), probed.len());
    }

    #[tokio::test]
    async fn test_all_true_returns_high() {
        let (result, _) = search_with_threshold(1, 500, usize::MAX).await;
        assert_eq!(result.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_false_at_low_is_exhausted() {
        let (result, probed) = search_with_threshold(1, 100, 0).await;
        assert!(matches!(
            result,
            Err(KanagenError::SearchExhausted { low: 1, high: 100 })
        ));
        assert!(probed.contains(&1));
    }

    #[tokio::test]
    async fn test_single_point_range() {
        let (result, probed) = search_with_threshold(5, 5, 9).await;
        assert_eq!(result.unwrap(), 5);
        assert_eq!(probed, vec![5]);

        let (result, _) = search_with_threshold(5, 5, 4).await;
        assert!(matches!(result, Err(KanagenError::SearchExhausted { .. })));
    }

    #[tokio::test]
    async fn test_invalid_range() {
        let (result, probed) = search_with_threshold(0, 10, 5).await;
        assert!(matches!(result, Err(KanagenError::InvalidInput(_))));
        assert!(probed.is_empty());

        let (result, _) = search_with_threshold(10, 3, 5).await;
        assert!(matches!(result, Err(KanagenError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_noisy_probe_still_terminates() {
        // One spurious failure below the true threshold
        let mut probed = Vec::new();
        let result = find_max_satisfying(1, 100, |n| {
            probed.push(n);
            ready(n <= 80 && n != 50)
        })
        .await;
        let found = result.unwrap();
        assert!(found < 50);
        assert!(probed.len() <= 8);
    }
}
