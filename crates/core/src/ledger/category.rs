use std::fmt;

/// Why a record has no valid artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCategory {
    /// The API reported a non-success status for the task.
    ApiError(String),
    EmptyResult,
    /// The crawl had not finished; carries the reported progress.
    Pending(String),
    CrawlFailed,
    /// The task-creation request for the record's batch failed.
    SubmitFailed(String),
    /// The artifact is missing from the store.
    FileNotFound,
    /// A valid result could not be written to the store.
    StoreFailed(String),
    Unknown(String),
}

impl FailureCategory {
    /// Short label for the ledger's `error_type` column.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureCategory::ApiError(_) => "API Error",
            FailureCategory::EmptyResult => "Empty Result",
            FailureCategory::Pending(_) => "Pending/Progress",
            FailureCategory::CrawlFailed => "Crawl Failed (0 pages)",
            FailureCategory::SubmitFailed(_) => "Submit Failed",
            FailureCategory::FileNotFound => "File Not Found",
            FailureCategory::StoreFailed(_) => "Store Failed",
            FailureCategory::Unknown(_) => "Unknown Error",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FailureCategory::Pending(_))
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCategory::ApiError(message) => write!(f, "API Error: {}", message),
            FailureCategory::Pending(progress) => write!(f, "Pending/Progress: {}", progress),
            FailureCategory::SubmitFailed(message) => write!(f, "Submit Failed: {}", message),
            FailureCategory::StoreFailed(detail) => write!(f, "Store Failed: {}", detail),
            FailureCategory::Unknown(detail) => write!(f, "Unknown Error: {}", detail),
            other => f.write_str(other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_strings() {
        assert_eq!(
            FailureCategory::ApiError("Invalid Field".into()).to_string(),
            "API Error: Invalid Field"
        );
        assert_eq!(FailureCategory::EmptyResult.to_string(), "Empty Result");
        assert_eq!(
            FailureCategory::Pending("in_progress".into()).to_string(),
            "Pending/Progress: in_progress"
        );
        assert_eq!(FailureCategory::CrawlFailed.to_string(), "Crawl Failed (0 pages)");
        assert_eq!(FailureCategory::FileNotFound.to_string(), "File Not Found");
        assert_eq!(
            FailureCategory::StoreFailed("disk full".into()).to_string(),
            "Store Failed: disk full"
        );
    }

    #[test]
    fn test_kind_is_short_label() {
        assert_eq!(FailureCategory::Pending("x".into()).kind(), "Pending/Progress");
        assert_eq!(FailureCategory::ApiError("x".into()).kind(), "API Error");
        assert!(FailureCategory::Pending("x".into()).is_pending());
        assert!(!FailureCategory::EmptyResult.is_pending());
    }
}
