//! Input files: search-rank CSV exports.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::record::RawRow;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Input folder not found: {0}")]
    FolderNotFound(PathBuf),

    #[error("Failed to list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One input file in processing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// File name, the unit the progress cursor compares.
    pub name: String,
    pub path: PathBuf,
}

impl InputFile {
    /// File name without the `.csv` extension.
    pub fn stem(&self) -> &str {
        self.name.strip_suffix(".csv").unwrap_or(&self.name)
    }
}

/// Every `*.csv` file in `dir`, sorted by file name.
pub fn list_input_files(dir: &Path) -> Result<Vec<InputFile>, InputError> {
    if !dir.is_dir() {
        return Err(InputError::FolderNotFound(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|e| InputError::List {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<InputFile> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            name.ends_with(".csv").then(|| InputFile {
                path: entry.path(),
                name,
            })
        })
        .collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Read all rows of a CSV file with headers, paired with their 0-based index.
///
/// Rows that fail to decode are skipped with a warning; their index is still
/// consumed so row numbers match the file.
pub fn read_rows(path: &Path) -> Result<Vec<(usize, RawRow)>, InputError> {
    let csv_err = |source| InputError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();

    let mut rows: Vec<(usize, RawRow)> = Vec::new();
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                let row: RawRow = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.trim_start_matches('\u{feff}'), v))
                    .collect();
                rows.push((index, row));
            }
            Err(e) => {
                warn!(path = %path.display(), row = index, error = %e, "Skipping unreadable input row");
            }
        }
    }
    Ok(rows)
}
