//! Pipeline module - collection loop and end-to-end dataset job.

mod collector;
mod dataset;

pub use collector::*;
pub use dataset::*;
