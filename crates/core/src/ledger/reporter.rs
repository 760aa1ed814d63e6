use std::collections::HashMap;

use super::{classify_issue, ErrorRecord, FailureCategory, Issue, LedgerEntry, LedgerHandle};
use crate::fetch::{FetchJob, TaskContext};
use crate::record::NormalizedRecord;
use crate::submit::{SubmitReport, NOT_ACKNOWLEDGED};

/// Classifies failures and queues them on the ledger.
#[derive(Debug, Clone)]
pub struct FailureReporter {
    ledger: LedgerHandle,
    severity_log: bool,
}

impl FailureReporter {
    /// `severity_log` controls whether rows also reach the text logs.
    pub fn new(ledger: LedgerHandle, severity_log: bool) -> Self {
        Self {
            ledger,
            severity_log,
        }
    }

    /// Record one failure and return the issue it was filed under.
    pub async fn report(
        &self,
        record: &NormalizedRecord,
        category: &FailureCategory,
        issue_override: Option<&Issue>,
    ) -> Issue {
        let issue = classify_issue(record.rank_absolute_value(), category, issue_override);
        tracing::warn!(
            issue = %issue,
            suburb = %record.suburb,
            rank = %record.rank_absolute,
            url = %record.url,
            "{}",
            category
        );
        let row = ErrorRecord::new(record, issue.clone(), category.kind(), category.to_string());
        self.ledger
            .record(LedgerEntry {
                record: row,
                severity_log: self.severity_log,
            })
            .await;
        issue
    }

    /// File every task of `report` that will not be fetched, and build the
    /// fetch job for the rest.
    ///
    /// Contexts of the submitted tasks move into the job. Any context left
    /// in `contexts` afterwards is filed as not acknowledged, so the map is
    /// empty on return.
    pub async fn report_submission(
        &self,
        report: SubmitReport,
        contexts: &mut HashMap<String, TaskContext>,
    ) -> FetchJob {
        for rejected in &report.rejected {
            if let Some(context) = contexts.remove(&rejected.tag) {
                let category = FailureCategory::ApiError(rejected.message.clone());
                self.report_context(&context, &category).await;
            }
        }
        for chunk in &report.failed {
            let category = FailureCategory::SubmitFailed(chunk.error.to_string());
            for task in &chunk.tasks {
                if let Some(context) = contexts.remove(&task.tag) {
                    self.report_context(&context, &category).await;
                }
            }
        }
        for task in &report.unacknowledged {
            if let Some(context) = contexts.remove(&task.tag) {
                self.report_context(&context, &task.category()).await;
            }
        }

        let mut job = FetchJob::new(report.submitted);
        for task in &job.tasks {
            if let Some(context) = contexts.remove(&task.tag) {
                job.contexts.insert(task.tag.clone(), context);
            }
        }

        let category = FailureCategory::Unknown(NOT_ACKNOWLEDGED.to_string());
        for (_, context) in contexts.drain() {
            self.report_context(&context, &category).await;
        }
        job
    }

    async fn report_context(&self, context: &TaskContext, category: &FailureCategory) -> Issue {
        self.report(&context.record, category, context.issue_override.as_ref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn record(rank: &str) -> NormalizedRecord {
        NormalizedRecord {
            record_type: "organic".to_string(),
            url: "https://example.com.au/page".to_string(),
            suburb: "Bondi Beach".to_string(),
            service: "Roofing".to_string(),
            rank_absolute: rank.to_string(),
            rank_group: "2".to_string(),
            domain: String::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_result_for_top_rank_is_critical() {
        let (tx, mut rx) = mpsc::channel(4);
        let reporter = FailureReporter::new(LedgerHandle::new(tx), false);

        let issue = reporter
            .report(&record("3"), &FailureCategory::EmptyResult, None)
            .await;

        assert_eq!(issue, Issue::Critical);
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.record.issue, Issue::Critical);
        assert_eq!(entry.record.error_type, "Empty Result");
        assert_eq!(entry.record.status, "Empty Result");
        assert!(!entry.severity_log);
    }

    #[tokio::test]
    async fn test_override_is_filed_verbatim() {
        let (tx, mut rx) = mpsc::channel(4);
        let reporter = FailureReporter::new(LedgerHandle::new(tx), true);
        let over = Issue::retry_failed(&Issue::Pending);

        reporter
            .report(&record("9"), &FailureCategory::CrawlFailed, Some(&over))
            .await;

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.record.issue.label(), "RETRY_FAILED_PENDING");
        assert!(entry.severity_log);
    }

    fn context(url: &str, issue_override: Option<Issue>) -> TaskContext {
        let mut record = record("2");
        record.url = url.to_string();
        TaskContext {
            record,
            issue_override,
        }
    }

    #[tokio::test]
    async fn test_submission_outcomes_are_all_filed() {
        use crate::submit::{RejectedTask, SubmittedTask, UnacknowledgedTask};

        let (tx, mut rx) = mpsc::channel(8);
        let reporter = FailureReporter::new(LedgerHandle::new(tx), false);
        let over = Issue::retry_failed(&Issue::Error);
        let mut contexts: HashMap<String, TaskContext> = [
            ("ok", "https://ok.com"),
            ("bad", "https://bad.com"),
            ("silent", "https://silent.com"),
            ("stray", "https://stray.com"),
        ]
        .into_iter()
        .map(|(tag, url)| (tag.to_string(), context(url, Some(over.clone()))))
        .collect();

        let report = SubmitReport {
            submitted: vec![SubmittedTask {
                id: "1".to_string(),
                url: "https://ok.com".to_string(),
                tag: "ok".to_string(),
            }],
            rejected: vec![RejectedTask {
                tag: "bad".to_string(),
                url: "https://bad.com".to_string(),
                status_code: 40501,
                message: "Invalid Field".to_string(),
            }],
            unacknowledged: vec![UnacknowledgedTask {
                tag: "silent".to_string(),
                url: "https://silent.com".to_string(),
                request_error: Some("40200 Payment Required.".to_string()),
            }],
            ..SubmitReport::default()
        };

        let job = reporter.report_submission(report, &mut contexts).await;
        drop(reporter);

        assert!(contexts.is_empty());
        assert_eq!(job.tasks.len(), 1);
        assert!(job.contexts.contains_key("ok"));

        let mut rows = Vec::new();
        while let Some(entry) = rx.recv().await {
            rows.push(entry.record);
        }
        rows.sort_by(|a, b| a.url.cmp(&b.url));
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.issue.label() == "RETRY_FAILED_Error"));
        assert_eq!(rows[0].status, "API Error: Invalid Field");
        assert_eq!(rows[1].status, "API Error: 40200 Payment Required.");
        assert_eq!(rows[2].url, "https://stray.com");
        assert_eq!(rows[2].status, "Unknown Error: not acknowledged by the API");
    }
}
