//! Append-only failure ledger.
//!
//! Failures are classified by [`FailureReporter`] and queued through a
//! cloneable [`LedgerHandle`]. A single [`LedgerWriter`] task serializes the
//! appends so concurrent fetches never interleave rows. Each sink
//! ([`CsvLedger`], [`SeverityLog`]) fails independently.

mod category;
mod csv_ledger;
mod handle;
mod reporter;
mod severity_log;
mod types;
mod writer;

pub use category::FailureCategory;
pub use csv_ledger::*;
pub use handle::*;
pub use reporter::FailureReporter;
pub use severity_log::*;
pub use types::*;
pub use writer::*;
