use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Progress file I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Progress file {path} is not valid JSON: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cursor would move backwards from {from_file}:{from_row} to {to_file}:{to_row}")]
    Regression {
        from_file: String,
        from_row: i64,
        to_file: String,
        to_row: i64,
    },
}

/// Last fully processed input file and row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCursor {
    pub last_file: Option<String>,
    pub last_row_index: i64,
}

impl Default for ProgressCursor {
    fn default() -> Self {
        Self {
            last_file: None,
            last_row_index: -1,
        }
    }
}

impl ProgressCursor {
    /// Files sorted strictly before `last_file` are finished.
    pub fn should_skip_file(&self, file_name: &str) -> bool {
        self.last_file
            .as_deref()
            .is_some_and(|last| file_name < last)
    }

    /// Rows up to `last_row_index` of `last_file` are finished.
    pub fn should_skip_row(&self, file_name: &str, row_index: usize) -> bool {
        self.last_file.as_deref() == Some(file_name)
            && i64::try_from(row_index).is_ok_and(|row| row <= self.last_row_index)
    }
}

/// Loads and atomically persists the [`ProgressCursor`].
///
/// Only the sequential submission loop owns a tracker.
#[derive(Debug)]
pub struct ProgressTracker {
    path: PathBuf,
    cursor: ProgressCursor,
}

impl ProgressTracker {
    /// Load the cursor at `path`, or start from the zero cursor if none exists.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ProgressError> {
        let path = path.into();
        let cursor = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| ProgressError::Corrupt {
                path: path.display().to_string(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ProgressCursor::default(),
            Err(e) => return Err(io_error(&path, e)),
        };
        debug!(path = %path.display(), ?cursor, "Loaded progress cursor");
        Ok(Self { path, cursor })
    }

    /// Delete any saved cursor and start from the beginning.
    pub async fn fresh(path: impl Into<PathBuf>) -> Result<Self, ProgressError> {
        let mut tracker = Self {
            path: path.into(),
            cursor: ProgressCursor::default(),
        };
        tracker.reset().await?;
        Ok(tracker)
    }

    pub fn cursor(&self) -> &ProgressCursor {
        &self.cursor
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a new cursor via temp file and rename.
    ///
    /// The cursor never moves backwards: an earlier file, or a lower row in
    /// the same file, is rejected.
    pub async fn save(&mut self, file_name: &str, row_index: i64) -> Result<(), ProgressError> {
        if let Some(last) = self.cursor.last_file.as_deref() {
            let backwards = file_name < last
                || (file_name == last && row_index < self.cursor.last_row_index);
            if backwards {
                return Err(ProgressError::Regression {
                    from_file: last.to_string(),
                    from_row: self.cursor.last_row_index,
                    to_file: file_name.to_string(),
                    to_row: row_index,
                });
            }
        }

        let next = ProgressCursor {
            last_file: Some(file_name.to_string()),
            last_row_index: row_index,
        };
        let json = serde_json::to_vec(&next).map_err(|e| ProgressError::Corrupt {
            path: self.path.display().to_string(),
            source: e,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        let temp = temp_path(&self.path);
        tokio::fs::write(&temp, &json)
            .await
            .map_err(|e| io_error(&temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        debug!(file = file_name, row = row_index, "Saved progress cursor");
        self.cursor = next;
        Ok(())
    }

    /// Delete the persisted cursor.
    pub async fn reset(&mut self) -> Result<(), ProgressError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => info!(path = %self.path.display(), "Progress cursor deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&self.path, e)),
        }
        self.cursor = ProgressCursor::default();
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, source: std::io::Error) -> ProgressError {
    ProgressError::Io {
        path: path.display().to_string(),
        source,
    }
}
