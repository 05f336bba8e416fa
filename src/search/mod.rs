//! Batch size discovery.

mod bisect;
mod planner;

pub use bisect::*;
pub use planner::*;
