//! Result collection for submitted tasks.
//!
//! Each task ends in exactly one of: artifact written, failure reported, or
//! counted as unaccounted when its result cannot be tied to a tag.

mod fetcher;
mod strategy;
mod types;
mod validate;

pub use fetcher::ResultFetcher;
pub use strategy::FetchStrategy;
pub use types::*;
pub use validate::*;
