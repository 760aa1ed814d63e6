use crate::api::{TaskEnvelope, SUCCESS_STATUS_CODE};
use crate::ledger::FailureCategory;

/// Crawl progress value of a completed crawl.
pub const CRAWL_FINISHED: &str = "finished";

/// Check one result envelope.
///
/// Conditions are checked in order (status code, emptiness, crawl progress,
/// pages crawled) and the first failing one decides the category.
pub fn validate_envelope(envelope: &TaskEnvelope) -> Result<(), FailureCategory> {
    if envelope.status_code != SUCCESS_STATUS_CODE {
        return Err(FailureCategory::ApiError(envelope.status_message.clone()));
    }

    let first = match envelope.result.as_deref() {
        Some([first, ..]) => first,
        _ => return Err(FailureCategory::EmptyResult),
    };

    let progress = first
        .get("crawl_progress")
        .and_then(|v| v.as_str())
        .unwrap_or("missing");
    if progress != CRAWL_FINISHED {
        return Err(FailureCategory::Pending(progress.to_string()));
    }

    let pages_crawled = first
        .get("crawl_status")
        .and_then(|s| s.get("pages_crawled"))
        .and_then(|p| p.as_u64())
        .unwrap_or(0);
    if pages_crawled == 0 {
        return Err(FailureCategory::CrawlFailed);
    }

    Ok(())
}
