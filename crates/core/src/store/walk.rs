use std::path::{Path, PathBuf};

use super::StoreError;

/// Every regular file below `root`, sorted. A missing root yields nothing.
pub async fn walk_files(root: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    if tokio::fs::metadata(root).await.is_err() {
        return Ok(files);
    }

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| StoreError::ReadFailed {
                path: dir.clone(),
                source: e,
            })?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::ReadFailed {
                path: dir.clone(),
                source: e,
            })?
        {
            let file_type = entry.file_type().await.map_err(|e| StoreError::ReadFailed {
                path: entry.path(),
                source: e,
            })?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}
