//! Channel layer: output buffering, pattern search, transcript capture.

mod buffer;
mod transcript;

pub use buffer::PatternBuffer;
pub use transcript::Transcript;
