//! Re-submission of failed and suspect records.
//!
//! Candidates come from two places: ledger rows matching a [`RetryPolicy`],
//! and undersized artifacts found by the [`ThinContentScanner`]. Both feed
//! the [`RetryRunner`], which writes into a separate store and ledger.

mod policy;
mod runner;
mod selector;
mod thin;

pub use policy::RetryPolicy;
pub use runner::*;
pub use selector::*;
pub use thin::*;

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("Error ledger not found: {0}")]
    LedgerNotFound(std::path::PathBuf),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to write report {path}: {source}")]
    Report {
        path: std::path::PathBuf,
        #[source]
        source: csv::Error,
    },
}
