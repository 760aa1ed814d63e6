//! Batch submission of crawl tasks.
//!
//! The caller owns a [`BatchBuffer`] and flushes it explicitly through a
//! [`BatchSubmitter`], which chunks, posts, and persists every raw response.

mod buffer;
mod queue;
mod submitter;

pub use buffer::BatchBuffer;
pub use queue::*;
pub use submitter::*;
