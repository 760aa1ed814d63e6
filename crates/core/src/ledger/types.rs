use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::FailureCategory;
use crate::record::NormalizedRecord;

/// Records ranked at or above this absolute position are critical.
pub const CRITICAL_RANK_THRESHOLD: u32 = 5;

const RETRY_FAILED_PREFIX: &str = "RETRY_FAILED_";

/// Severity label of a ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Issue {
    Critical,
    Error,
    Pending,
    /// A retried record failed again; carries the original label.
    RetryFailed(String),
    Other(String),
}

impl Issue {
    pub fn label(&self) -> String {
        match self {
            Issue::Critical => "CRITICAL".to_string(),
            Issue::Error => "Error".to_string(),
            Issue::Pending => "PENDING".to_string(),
            Issue::RetryFailed(original) => format!("{}{}", RETRY_FAILED_PREFIX, original),
            Issue::Other(label) => label.clone(),
        }
    }

    /// Override used when a retried record fails again.
    pub fn retry_failed(original: &Issue) -> Issue {
        Issue::RetryFailed(original.label())
    }

    /// The issue a record was first filed under, looking through retry failures.
    pub fn original(&self) -> Issue {
        match self {
            Issue::RetryFailed(original) => {
                let Ok(issue) = original.parse::<Issue>();
                issue
            }
            other => other.clone(),
        }
    }

    /// Critical rows go to `warning.txt`.
    pub fn is_critical(&self) -> bool {
        match self {
            Issue::Critical => true,
            Issue::RetryFailed(original) => original.eq_ignore_ascii_case("CRITICAL"),
            _ => false,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Issue {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.eq_ignore_ascii_case("CRITICAL") {
            Issue::Critical
        } else if s.eq_ignore_ascii_case("ERROR") {
            Issue::Error
        } else if s.eq_ignore_ascii_case("PENDING") {
            Issue::Pending
        } else if let Some(original) = s.strip_prefix(RETRY_FAILED_PREFIX) {
            Issue::RetryFailed(original.to_string())
        } else {
            Issue::Other(s.to_string())
        })
    }
}

impl Serialize for Issue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for Issue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let Ok(issue) = s.parse::<Issue>();
        Ok(issue)
    }
}

/// Severity for a failed record.
///
/// An override wins verbatim. Otherwise pending crawls are `PENDING` and
/// everything else follows the rank rule.
pub fn classify_issue(
    rank_absolute: u32,
    category: &FailureCategory,
    issue_override: Option<&Issue>,
) -> Issue {
    if let Some(issue) = issue_override {
        return issue.clone();
    }
    if category.is_pending() {
        Issue::Pending
    } else if rank_absolute <= CRITICAL_RANK_THRESHOLD {
        Issue::Critical
    } else {
        Issue::Error
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "Issue")]
    pub issue: Issue,
    pub suburb: String,
    pub service: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub rank: String,
    pub rank_group: String,
    pub url: String,
    /// Short failure kind.
    pub error_type: String,
    /// Full failure detail.
    pub status: String,
}

impl ErrorRecord {
    pub fn new(
        record: &NormalizedRecord,
        issue: Issue,
        error_type: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            issue,
            suburb: record.suburb.clone(),
            service: record.service.clone(),
            record_type: record.record_type.clone(),
            rank: record.rank_absolute.clone(),
            rank_group: record.rank_group.clone(),
            url: record.url.clone(),
            error_type: error_type.into(),
            status: status.into(),
        }
    }

    /// Rebuild the normalized record this row was written for.
    pub fn to_record(&self) -> NormalizedRecord {
        NormalizedRecord {
            record_type: self.record_type.clone(),
            url: self.url.clone(),
            suburb: self.suburb.clone(),
            service: self.service.clone(),
            rank_absolute: self.rank.clone(),
            rank_group: self.rank_group.clone(),
            domain: String::new(),
        }
    }
}

/// A row plus routing hints for the sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub record: ErrorRecord,
    /// Also write a line to the per-directory severity log.
    pub severity_log: bool,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Ledger CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A destination for ledger rows.
pub trait Ledger: Send + Sync {
    /// Sink name for logging.
    fn name(&self) -> &str;

    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError>;
}
