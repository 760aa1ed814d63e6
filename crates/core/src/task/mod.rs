//! Conversion of normalized records into crawl task descriptors.
//!
//! The builder decides per record whether a network task is needed at all.
//! Records without a crawlable URL take the metadata-only path and get a stub
//! artifact instead.

mod builder;
mod types;
mod url_rules;

pub use builder::*;
pub use types::*;
pub use url_rules::*;
