//! Secondary stages: queued fetch, retry, thin scan, reconcile, merge.

use std::sync::Arc;

use tracing::{info, warn};

use super::runner::{finish_ledger, Pipeline};
use super::types::PipelineError;
use crate::api::{Fetcher, Submitter};
use crate::fetch::{FetchJob, FetchStrategy, FetchSummary};
use crate::ledger::FailureReporter;
use crate::reconcile::{reconcile_missing, ReconcileSummary};
use crate::retry::{
    RetryError, RetryPolicy, RetryRunner, RetrySelector, RetrySummary, ThinContentScanner,
    ThinScan,
};
use crate::store::{merge_stores, ContentWriter, MergeSummary};
use crate::submit::{load_queued_submissions, BatchSubmitter};
use crate::task::TaskBuilder;

impl<A: Submitter + Fetcher + 'static> Pipeline<A> {
    /// Fetch results for every submission persisted in the queue directory.
    ///
    /// The configured delay is skipped; those tasks were posted earlier.
    pub async fn fetch_queued(&self) -> Result<FetchSummary, PipelineError> {
        let paths = &self.config.paths;
        let submissions = load_queued_submissions(&paths.queue_dir).await?;

        let (ledger, ledger_task) = self.start_ledger(&paths.ledger_path(), &paths.store_root);
        let fetcher = self.fetcher(
            ContentWriter::new(&paths.store_root),
            FailureReporter::new(ledger.clone(), false),
        );
        let fetcher = match fetcher.strategy() {
            FetchStrategy::Delayed(_) => fetcher.with_strategy(FetchStrategy::Immediate),
            _ => fetcher,
        };

        let mut summary = FetchSummary::default();
        for submission in submissions {
            if self.shutdown.is_triggered() {
                warn!("Interrupted; remaining queued submissions left for a later run");
                break;
            }
            info!(
                path = %submission.path.display(),
                tasks = submission.tasks.len(),
                "Fetching queued submission"
            );
            summary += fetcher.run(FetchJob::new(submission.tasks)).await;
        }

        drop(fetcher);
        finish_ledger(ledger, ledger_task).await;
        Ok(summary)
    }

    /// Run one retry generation (1-based).
    ///
    /// Generation 1 selects from the primary ledger; later generations select
    /// from the retry ledger and skip records the retry store already holds.
    /// With `include_thin`, undersized primary artifacts are added.
    pub async fn retry(&self, generation: u32, include_thin: bool) -> Result<RetrySummary, PipelineError> {
        if generation == 0 {
            return Err(PipelineError::InvalidGeneration(generation));
        }
        let retry = &self.config.retry;
        let profile = retry.profile_for_generation(generation);
        let retry_store = ContentWriter::new(&retry.store_root);

        let selector = RetrySelector::new(RetryPolicy::new(retry, &self.config.search_engine_domains));
        let source = if generation == 1 {
            self.config.paths.ledger_path()
        } else {
            retry.ledger_path()
        };
        let mut candidates = match selector.select_from_ledger(&source) {
            Ok(candidates) => candidates,
            Err(RetryError::LedgerNotFound(path)) => {
                warn!(path = %path.display(), "No ledger to retry from");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        if generation > 1 {
            let mut outstanding = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                if !retry_store.exists(&candidate.artifact).await {
                    outstanding.push(candidate);
                }
            }
            candidates = outstanding;
        }

        if include_thin {
            let scanner = self.thin_scanner();
            let scan = scanner.scan(&self.config.paths.store_root).await?;
            candidates.extend(scan.candidates(scanner.top_n()));
        }

        let (ledger, ledger_task) = self.start_ledger(&retry.ledger_path(), &retry.store_root);
        let reporter = FailureReporter::new(ledger.clone(), false);
        let runner = RetryRunner::new(
            TaskBuilder::from_config(&self.config),
            BatchSubmitter::new(
                Arc::clone(&self.api),
                self.config.submit.batch_size,
                &retry.queue_dir,
            ),
            self.fetcher(retry_store, reporter.clone()),
            reporter,
        );

        let summary = runner.run(candidates, generation, profile).await;
        drop(runner);
        finish_ledger(ledger, ledger_task).await;
        Ok(summary)
    }

    /// Scan the primary store for thin artifacts and write the report.
    pub async fn thin_scan(&self) -> Result<ThinScan, PipelineError> {
        let scanner = self.thin_scanner();
        let root = &self.config.paths.store_root;
        let scan = scanner.scan(root).await?;
        let report = scanner.write_report(root, &scan)?;
        info!(report = %report.display(), rows = scan.artifacts.len(), "Thin-content report written");
        Ok(scan)
    }

    /// File a `File Not Found` row for every input row without an artifact.
    pub async fn reconcile(&self) -> Result<ReconcileSummary, PipelineError> {
        let paths = &self.config.paths;
        let (ledger, ledger_task) = self.start_ledger(&paths.ledger_path(), &paths.store_root);
        let reporter = FailureReporter::new(ledger.clone(), true);

        let outcome = reconcile_missing(
            &paths.input_dir,
            &ContentWriter::new(&paths.store_root),
            &reporter,
        )
        .await;

        drop(reporter);
        finish_ledger(ledger, ledger_task).await;
        Ok(outcome?)
    }

    /// Copy the primary store into the final store and overlay retried artifacts.
    pub async fn merge(&self) -> Result<MergeSummary, PipelineError> {
        let paths = &self.config.paths;
        Ok(merge_stores(
            &paths.store_root,
            &self.config.retry.store_root,
            &paths.final_store_root,
            &paths.ledger_file,
        )
        .await?)
    }

    fn thin_scanner(&self) -> ThinContentScanner {
        ThinContentScanner::new(self.config.thin_content.clone(), self.config.url_rules.clone())
    }
}
