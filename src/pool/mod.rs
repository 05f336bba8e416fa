//! Pool module - bounded concurrency for backend calls.

mod limiter;

pub use limiter::*;
