use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::{dedup_candidates, CandidateSource, RetryCandidate};
use crate::api::{Fetcher, Submitter};
use crate::fetch::{FetchSummary, ResultFetcher, TaskContext};
use crate::ledger::{FailureReporter, Issue};
use crate::submit::BatchSubmitter;
use crate::task::{BuildOutcome, FetchProfile, TaskBuilder};

/// Counters for one retry generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub generation: u32,
    pub candidates: usize,
    pub from_ledger: usize,
    pub from_thin_scan: usize,
    /// Candidates that no longer produce a network task.
    pub skipped: usize,
    pub submitted: usize,
    pub rejected: usize,
    pub submit_failed: usize,
    /// Tasks a successful submission response did not mention.
    pub unacknowledged: usize,
    pub fetch: FetchSummary,
}

/// Re-submits retry candidates with an escalated profile.
///
/// The submitter, fetcher, and reporter must all point at the retry store,
/// queue, and ledger. Failures are filed as `RETRY_FAILED_<original>`.
pub struct RetryRunner<A: Submitter + Fetcher + 'static> {
    builder: TaskBuilder,
    submitter: BatchSubmitter<A>,
    fetcher: ResultFetcher<A>,
    reporter: FailureReporter,
}

impl<A: Submitter + Fetcher + 'static> RetryRunner<A> {
    pub fn new(
        builder: TaskBuilder,
        submitter: BatchSubmitter<A>,
        fetcher: ResultFetcher<A>,
        reporter: FailureReporter,
    ) -> Self {
        Self {
            builder,
            submitter,
            fetcher,
            reporter,
        }
    }

    pub async fn run(
        &self,
        candidates: Vec<RetryCandidate>,
        generation: u32,
        profile: FetchProfile,
    ) -> RetrySummary {
        let candidates = dedup_candidates(candidates);
        let mut summary = RetrySummary {
            generation,
            candidates: candidates.len(),
            from_ledger: count_source(&candidates, CandidateSource::Ledger),
            from_thin_scan: count_source(&candidates, CandidateSource::ThinContent),
            ..RetrySummary::default()
        };
        info!(
            generation,
            profile = %profile,
            candidates = summary.candidates,
            "Starting retry"
        );

        let mut tasks = Vec::new();
        let mut contexts: HashMap<String, TaskContext> = HashMap::new();
        for candidate in &candidates {
            match self
                .builder
                .build_at(&candidate.record, profile, candidate.artifact.clone())
            {
                BuildOutcome::Network(task) => {
                    contexts.insert(
                        task.tag.clone(),
                        TaskContext {
                            record: candidate.record.clone(),
                            issue_override: Some(Issue::retry_failed(&candidate.original_issue)),
                        },
                    );
                    tasks.push(task);
                }
                BuildOutcome::MetadataOnly { path, reason } => {
                    debug!(tag = %path, ?reason, "Retry candidate has no crawlable URL");
                    summary.skipped += 1;
                }
            }
        }
        if tasks.is_empty() {
            info!(generation, "Nothing to retry");
            return summary;
        }

        let report = self
            .submitter
            .submit(&format!("retry_g{}", generation), tasks)
            .await;
        summary.submitted = report.submitted.len();
        summary.rejected = report.rejected.len();
        summary.submit_failed = report.failed_task_count();
        summary.unacknowledged = report.unacknowledged.len();
        if !report.failed.is_empty() {
            warn!(
                generation,
                tasks = summary.submit_failed,
                "Retry batches were not submitted"
            );
        }

        let job = self
            .reporter
            .report_submission(report, &mut contexts)
            .await;
        summary.fetch = self.fetcher.run(job).await;

        info!(
            generation,
            submitted = summary.submitted,
            saved = summary.fetch.saved,
            failed = summary.fetch.failed + summary.fetch.pending,
            "Retry complete"
        );
        summary
    }
}

fn count_source(candidates: &[RetryCandidate], source: CandidateSource) -> usize {
    candidates.iter().filter(|c| c.source == source).count()
}
