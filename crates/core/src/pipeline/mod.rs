//! Pipeline stages.
//!
//! [`Pipeline`] wires the components together for each entry point:
//! - **Run**: input rows to artifacts, sequential submission, concurrent fetch
//! - **Fetch**: collect results for persisted submissions
//! - **Retry**: re-submit ledger and thin-content candidates
//! - **Reconcile** and **Merge**: bookkeeping passes over the stores

mod runner;
mod stages;
mod types;

pub use runner::Pipeline;
pub use types::{PipelineError, RunSummary};
