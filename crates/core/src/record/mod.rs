//! Input records and the on-disk artifact naming scheme.
//!
//! Every input row is reduced to a [`NormalizedRecord`]. The record's
//! [`ArtifactPath`] is both the location of its artifact in the content store
//! and the correlation tag sent to the crawling API.

mod artifact;
mod types;

pub use artifact::*;
pub use types::*;
