use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{ErrorRecord, Ledger, LedgerEntry, LedgerError};

/// CSV ledger; the header is written once when the file is created.
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with only a header if it does not exist yet.
    pub fn initialize(&self) -> Result<(), LedgerError> {
        if has_content(&self.path) {
            return Ok(());
        }
        info!(path = %self.path.display(), "Creating error ledger");
        ensure_parent(&self.path)?;
        let file = fs::File::create(&self.path).map_err(|e| io_error(&self.path, e))?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(LEDGER_COLUMNS)?;
        writer.flush().map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }
}

/// Header row of every ledger file.
pub const LEDGER_COLUMNS: [&str; 9] = [
    "Issue",
    "suburb",
    "service",
    "type",
    "rank",
    "rank_group",
    "url",
    "error_type",
    "status",
];

impl Ledger for CsvLedger {
    fn name(&self) -> &str {
        "csv"
    }

    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let write_header = !has_content(&self.path);
        ensure_parent(&self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(&entry.record)?;
        writer.flush().map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }
}

/// Read every row of a ledger file. Malformed rows are skipped.
pub fn read_ledger(path: &Path) -> Result<Vec<ErrorRecord>, LedgerError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<ErrorRecord>().enumerate() {
        match row {
            Ok(record) => records.push(record),
            Err(e) => warn!(path = %path.display(), row = index, error = %e, "Skipping malformed ledger row"),
        }
    }
    Ok(records)
}

fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

pub(super) fn ensure_parent(path: &Path) -> Result<(), LedgerError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))
        }
        _ => Ok(()),
    }
}

pub(super) fn io_error(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.display().to_string(),
        source,
    }
}
