use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use super::csv_ledger::{ensure_parent, io_error};
use super::{Ledger, LedgerEntry, LedgerError};
use crate::record::slugify;

pub const WARNING_LOG: &str = "warning.txt";
pub const ERROR_LOG: &str = "error.txt";

/// Human-readable log next to the artifacts: `{root}/{suburb}/{type}/warning.txt`
/// for critical rows, `error.txt` for the rest.
pub struct SeverityLog {
    root: PathBuf,
}

impl SeverityLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn log_path(&self, entry: &LedgerEntry) -> PathBuf {
        let record = &entry.record;
        let file = if record.issue.is_critical() {
            WARNING_LOG
        } else {
            ERROR_LOG
        };
        self.root
            .join(slugify(&record.suburb))
            .join(slugify(&record.record_type))
            .join(file)
    }
}

/// `[CRITICAL] Rank: 3 (RG: 2) | Error: Empty Result | URL: https://...`
pub fn format_severity_line(entry: &LedgerEntry) -> String {
    let r = &entry.record;
    format!(
        "[{}] Rank: {} (RG: {}) | Error: {} | URL: {}",
        r.issue, r.rank, r.rank_group, r.status, r.url
    )
}

impl Ledger for SeverityLog {
    fn name(&self) -> &str {
        "severity_log"
    }

    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        if !entry.severity_log {
            return Ok(());
        }
        let path = self.log_path(entry);
        ensure_parent(&path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;
        writeln!(file, "{}", format_severity_line(entry)).map_err(|e| io_error(&path, e))
    }
}
