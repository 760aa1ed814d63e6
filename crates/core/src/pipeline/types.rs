use thiserror::Error;

use crate::fetch::FetchSummary;
use crate::input::InputError;
use crate::ledger::LedgerError;
use crate::progress::{ProgressCursor, ProgressError};
use crate::retry::RetryError;
use crate::store::StoreError;
use crate::submit::SubmitError;

/// Errors that stop a pipeline stage.
///
/// Per-record and per-task failures never surface here; they go to the
/// ledger.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("progress error: {0}")]
    Progress(#[from] ProgressError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("submission queue error: {0}")]
    Queue(#[from] SubmitError),

    #[error("retry error: {0}")]
    Retry(#[from] RetryError),

    #[error("invalid retry generation {0}; generations start at 1")]
    InvalidGeneration(u32),
}

/// Counters for one primary run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Input files read in this run.
    pub files: usize,
    /// Files skipped entirely because the cursor is past them.
    pub files_skipped: usize,
    pub rows: usize,
    /// Rows skipped because the cursor is past them.
    pub rows_skipped: usize,
    pub stubs: usize,
    pub stub_errors: usize,
    /// Rows whose tag repeated one already buffered.
    pub duplicates: usize,
    pub submitted: usize,
    pub rejected: usize,
    pub submit_failed: usize,
    /// Tasks a successful submission response did not mention.
    pub unacknowledged: usize,
    pub fetch: FetchSummary,
    /// Entries the ledger writer received.
    pub ledger_entries: u64,
    pub cursor: ProgressCursor,
    pub interrupted: bool,
}
