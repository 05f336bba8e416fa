//! kanagen - Pronunciation dataset generation over an inference backend.
//!
//! ## Architecture
//!
//! - **Batch size planning**: bisect for the largest batch the backend
//!   answers in full, then run with a safety margin below it
//! - **Collection**: fan each round's remaining words out as concurrent
//!   batches, merge valid answers, back off on rate limits, repeat
//!
//! ## Failure model
//!
//! - Rate limiting is transient: the round is retried after a backoff
//! - Any other backend failure is fatal for the run
//! - Retries are bounded; exceeding the budget is fatal

pub mod backend;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod search;
pub mod source;

// Re-exports for convenience
pub use backend::{DummyBackend, InferenceBackend, KatakanaFilter, ResultFilter};
pub use models::{BatchConfig, Config, InferenceError, KanagenError, Result, RunStats};
pub use pipeline::{DatasetPipeline, RetryPolicy, RetryingCollector};
pub use pool::ConcurrencyLimiter;
pub use search::{find_max_satisfying, plan_batch_size};
