//! Durable resume cursor for the primary pipeline.

mod tracker;

pub use tracker::*;
