//! Batch size planning.
//!
//! Either takes a configured batch size as-is, or discovers the largest
//! batch the backend answers in full and runs with a safety margin below
//! it. A discovered maximum is a single noisy sample of backend capacity,
//! so real batches never run at the edge.

use crate::backend::{InferenceBackend, ResultFilter};
use crate::models::{BatchConfig, KanagenError, Result};
use crate::search::find_max_satisfying;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use tracing::{info, warn};

/// Smallest batch size worth collecting with.
pub const MIN_BATCH_SIZE: usize = 10;

/// Choose the batch size for a run.
pub async fn plan_batch_size(
    config: &BatchConfig,
    words: &[String],
    backend: &dyn InferenceBackend,
    filter: &dyn ResultFilter,
    rng: &mut StdRng,
) -> Result<usize> {
    let batch_size = match *config {
        BatchConfig::Fixed { batch_size } => {
            info!("Using fixed batch size");
            batch_size
        }
        BatchConfig::Bisect {
            max_batch_size,
            ratio,
        } => {
            info!("Finding optimal batch size by bisection");
            let discovered =
                find_max_batch_size(words, max_batch_size, backend, filter, rng).await?;
            let batch_size = scale_batch_size(discovered, ratio);
            if batch_size < MIN_BATCH_SIZE {
                return Err(KanagenError::BatchSizeTooSmall {
                    batch_size,
                    minimum: MIN_BATCH_SIZE,
                });
            }
            batch_size
        }
    };

    info!(batch_size, "Batch size planned");
    Ok(batch_size)
}

/// Apply the safety ratio to a discovered maximum, rounding down.
pub fn scale_batch_size(max_batch_size: usize, ratio: f64) -> usize {
    (max_batch_size as f64 * ratio).floor() as usize
}

/// Bisect for the largest batch the backend answers completely.
///
/// A probe at size `n` sends `n` randomly sampled words and succeeds only
/// when all `n` come back valid. Backend errors count as failure at that
/// size rather than aborting the search.
pub async fn find_max_batch_size(
    words: &[String],
    max_batch_size: usize,
    backend: &dyn InferenceBackend,
    filter: &dyn ResultFilter,
    rng: &mut StdRng,
) -> Result<usize> {
    let high = words.len().min(max_batch_size);
    if high == 0 {
        return Err(KanagenError::InvalidInput(
            "cannot size batches for an empty word list".to_string(),
        ));
    }

    let found = find_max_satisfying(1, high, |batch_size| {
        let sample: Vec<String> = words.choose_multiple(&mut *rng, batch_size).cloned().collect();
        async move {
            info!(batch_size, backend = backend.name(), "Trying batch size");
            match backend.infer(&sample).await {
                Ok(answers) => {
                    let valid = filter.filter(answers);
                    let answered = sample.iter().filter(|w| valid.contains_key(*w)).count();
                    info!(batch_size, answered, "Probe answered");
                    answered == batch_size
                }
                Err(e) => {
                    warn!(batch_size, error = %e, "Probe failed");
                    false
                }
            }
        }
    })
    .await?;

    info!(max_batch_size = found, "Found maximum batch size");
    Ok(found)
}
