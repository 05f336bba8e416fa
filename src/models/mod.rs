//! Core data models for kanagen.
//!
//! - `config`: everything the user tunes per run
//! - `error`: failure taxonomy, split at the backend boundary
//! - `record`: what gets written and what gets reported

mod config;
mod error;
mod record;

pub use config::*;
pub use error::*;
pub use record::*;
