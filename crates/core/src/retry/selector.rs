use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use super::{RetryError, RetryPolicy};
use crate::ledger::{read_ledger, ErrorRecord, Issue};
use crate::record::{ArtifactPath, NormalizedRecord};

/// Where a retry candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Ledger,
    ThinContent,
}

/// A record queued for re-submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryCandidate {
    pub record: NormalizedRecord,
    pub artifact: ArtifactPath,
    /// Issue the record was originally filed under.
    pub original_issue: Issue,
    pub source: CandidateSource,
}

impl RetryCandidate {
    pub fn from_ledger_row(row: &ErrorRecord) -> Self {
        let record = row.to_record();
        Self {
            artifact: ArtifactPath::for_record(&record),
            record,
            original_issue: row.issue.original(),
            source: CandidateSource::Ledger,
        }
    }

    pub fn tag(&self) -> String {
        self.artifact.tag()
    }
}

/// Applies a [`RetryPolicy`] to the error ledger.
#[derive(Debug, Clone)]
pub struct RetrySelector {
    policy: RetryPolicy,
}

impl RetrySelector {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn select(&self, rows: &[ErrorRecord]) -> Vec<RetryCandidate> {
        rows.iter()
            .filter(|row| self.policy.matches(row))
            .map(RetryCandidate::from_ledger_row)
            .collect()
    }

    /// Read the ledger at `path` and select matching rows.
    pub fn select_from_ledger(&self, path: &Path) -> Result<Vec<RetryCandidate>, RetryError> {
        if !path.exists() {
            return Err(RetryError::LedgerNotFound(path.to_path_buf()));
        }
        let rows = read_ledger(path)?;
        let selected = self.select(&rows);
        info!(
            rows = rows.len(),
            selected = selected.len(),
            skipped = rows.len() - selected.len(),
            "Ledger scanned for retry"
        );
        Ok(selected)
    }
}

/// Drop later candidates whose tag was already seen.
pub fn dedup_candidates(candidates: impl IntoIterator<Item = RetryCandidate>) -> Vec<RetryCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.tag()))
        .collect()
}
