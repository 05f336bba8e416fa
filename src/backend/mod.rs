//! Inference backend capability and answer validation.

mod dummy;
mod filter;
mod inference;

pub use dummy::*;
pub use filter::*;
pub use inference::*;
