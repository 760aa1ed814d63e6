use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use super::{walk_files, StoreError};

/// Outcome of [`merge_stores`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Files copied from the primary store.
    pub copied: usize,
    /// Files overlaid from the retry store.
    pub patched: usize,
}

/// Build a final store from the primary store overlaid with retried artifacts.
///
/// `skip_file_name` (the primary ledger) is not copied; no CSV file from the
/// retry store is copied.
pub async fn merge_stores(
    primary: &Path,
    retry: &Path,
    destination: &Path,
    skip_file_name: &str,
) -> Result<MergeSummary, StoreError> {
    let mut summary = MergeSummary::default();
    create_dir(destination).await?;

    for source in walk_files(primary).await? {
        if source.file_name().is_some_and(|n| n == skip_file_name) {
            continue;
        }
        copy_into(primary, &source, destination).await?;
        summary.copied += 1;
    }
    info!(copied = summary.copied, "Primary store copied");

    for source in walk_files(retry).await? {
        if source.extension().is_some_and(|ext| ext == "csv") {
            continue;
        }
        copy_into(retry, &source, destination).await?;
        summary.patched += 1;
    }
    info!(patched = summary.patched, destination = %destination.display(), "Retry store merged");

    Ok(summary)
}

async fn copy_into(root: &Path, source: &Path, destination: &Path) -> Result<(), StoreError> {
    let relative = source.strip_prefix(root).unwrap_or(source);
    let target: PathBuf = destination.join(relative);
    if let Some(parent) = target.parent() {
        create_dir(parent).await?;
    }
    fs::copy(source, &target)
        .await
        .map_err(|e| StoreError::CopyFailed {
            source_path: source.to_path_buf(),
            destination: target.clone(),
            source: e,
        })?;
    debug!(from = %source.display(), to = %target.display(), "Copied");
    Ok(())
}

async fn create_dir(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| StoreError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_retry_overlays_primary() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("primary");
        let retry = dir.path().join("retry");
        let out = dir.path().join("FINAL_DATABASE");

        write(&primary, "_error_summary.csv", "Issue\n");
        write(&primary, "Manly/organic/type-organic_rg1_ra1_a.md", "thin");
        write(&primary, "Manly/organic/type-organic_rg2_ra2_b.md", "kept");
        write(&retry, "_retry_report.csv", "Issue\n");
        write(&retry, "Manly/organic/type-organic_rg1_ra1_a.md", "fixed");

        let summary = merge_stores(&primary, &retry, &out, "_error_summary.csv")
            .await
            .unwrap();

        assert_eq!(summary, MergeSummary { copied: 2, patched: 1 });
        assert!(!out.join("_error_summary.csv").exists());
        assert!(!out.join("_retry_report.csv").exists());
        assert_eq!(
            std::fs::read_to_string(out.join("Manly/organic/type-organic_rg1_ra1_a.md")).unwrap(),
            "fixed"
        );
        assert_eq!(
            std::fs::read_to_string(out.join("Manly/organic/type-organic_rg2_ra2_b.md")).unwrap(),
            "kept"
        );
    }

    #[tokio::test]
    async fn test_missing_retry_store_copies_primary_only() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("primary");
        write(&primary, "A/organic/x.md", "x");

        let summary = merge_stores(&primary, &dir.path().join("none"), &dir.path().join("out"), "_e.csv")
            .await
            .unwrap();
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.patched, 0);
    }
}
