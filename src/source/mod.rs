//! Word list loading and selection.

mod words;

pub use words::*;
