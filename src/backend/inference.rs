//! The inference backend capability.
//!
//! A backend takes an ordered batch of words and returns raw answers keyed
//! by word. It may return fewer entries than requested, and may return
//! entries that were never requested; callers must not trust either.
//! Failures are typed so that rate limiting can be told apart from
//! everything else without inspecting messages.

use crate::models::{AnswerMap, InferenceError};
use async_trait::async_trait;

/// Result of a single backend call.
pub type InferenceResult = std::result::Result<AnswerMap, InferenceError>;

/// Async capability for batch inference.
///
/// Implementors must be `Send + Sync` so they can be shared across spawned
/// batch tasks (e.g. wrapped in `Arc<dyn InferenceBackend>`).
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Answer a batch of words.
    async fn infer(&self, words: &[String]) -> InferenceResult;
}
