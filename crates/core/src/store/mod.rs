//! Content store: per-record artifacts under `{root}/{suburb}/{type}/`.

mod error;
mod merge;
mod walk;
mod writer;

pub use error::StoreError;
pub use merge::*;
pub use walk::walk_files;
pub use writer::*;
