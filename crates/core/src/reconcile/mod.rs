//! Missing-artifact reconciliation.
//!
//! Every input row is expected to have an artifact, whether a fetched result
//! or a metadata stub. Rows without one are filed as `File Not Found`.

use std::path::Path;

use tracing::{info, warn};

use crate::input::{list_input_files, read_rows, InputError};
use crate::ledger::{FailureCategory, FailureReporter};
use crate::record::{ArtifactPath, NormalizedRecord};
use crate::store::ContentWriter;

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub files: usize,
    pub rows: usize,
    pub missing: usize,
}

/// Check every row in `input_dir` against the store behind `writer`.
pub async fn reconcile_missing(
    input_dir: &Path,
    writer: &ContentWriter,
    reporter: &FailureReporter,
) -> Result<ReconcileSummary, InputError> {
    let mut summary = ReconcileSummary::default();

    for file in list_input_files(input_dir)? {
        info!(file = %file.name, "Checking artifacts");
        let rows = match read_rows(&file.path) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(file = %file.name, "Skipping unreadable input file: {}", e);
                continue;
            }
        };
        summary.files += 1;

        let mut missing_in_file = 0;
        for (_, row) in rows {
            summary.rows += 1;
            let record = NormalizedRecord::from_row(&row);
            let artifact = ArtifactPath::for_record(&record);
            if writer.exists(&artifact).await {
                continue;
            }
            reporter
                .report(&record, &FailureCategory::FileNotFound, None)
                .await;
            missing_in_file += 1;
        }
        summary.missing += missing_in_file;
        if missing_in_file > 0 {
            warn!(file = %file.name, missing = missing_in_file, "Artifacts missing");
        }
    }

    info!(
        files = summary.files,
        rows = summary.rows,
        missing = summary.missing,
        "Reconciliation complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Issue, LedgerHandle};
    use crate::testing::fixtures;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_reports_only_missing_artifacts() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("input");
        fixtures::write_input_csv(
            &input.join("a.csv"),
            &[
                fixtures::csv_line("organic", "https://present.com", "Manly", 2, 1),
                fixtures::csv_line("organic", "https://absent.com", "Manly", 8, 6),
            ],
        );
        let writer = ContentWriter::new(dir.path().join("store"));
        let present = NormalizedRecord::from_row(&fixtures::raw_row(
            "organic",
            "https://present.com",
            "Manly",
            2,
            1,
        ));
        writer
            .write_result(&ArtifactPath::for_record(&present), &serde_json::json!({}))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let reporter = FailureReporter::new(LedgerHandle::new(tx), true);
        let summary = reconcile_missing(&input, &writer, &reporter).await.unwrap();
        drop(reporter);

        assert_eq!(
            summary,
            ReconcileSummary {
                files: 1,
                rows: 2,
                missing: 1
            }
        );
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.record.url, "https://absent.com");
        assert_eq!(entry.record.issue, Issue::Error);
        assert_eq!(entry.record.error_type, "File Not Found");
        assert!(entry.severity_log);
        assert!(rx.recv().await.is_none());
    }
}
