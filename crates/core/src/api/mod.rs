//! Crawling API abstraction.
//!
//! The pipeline only talks to the remote service through the [`Submitter`] and
//! [`Fetcher`] capability traits. [`DataForSeoClient`] is the HTTP
//! implementation; tests use `testing::MockTaskApi`.

mod dataforseo;
mod types;

pub use dataforseo::DataForSeoClient;
pub use types::*;
