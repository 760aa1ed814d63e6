//! Primary run loop.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::types::{PipelineError, RunSummary};
use crate::api::{Fetcher, Submitter};
use crate::config::Config;
use crate::fetch::{FetchSummary, ResultFetcher, TaskContext};
use crate::input::{list_input_files, read_rows, InputFile};
use crate::ledger::{
    configured_sinks, create_ledger_system, CsvLedger, FailureReporter, LedgerHandle,
};
use crate::progress::{ProgressError, ProgressTracker};
use crate::record::{NormalizedRecord, RawRow};
use crate::shutdown::ShutdownSignal;
use crate::store::ContentWriter;
use crate::submit::{BatchBuffer, BatchSubmitter};
use crate::task::{BuildOutcome, FetchProfile, TaskBuilder};

/// Drives records from input files to artifacts and ledger rows.
pub struct Pipeline<A: Submitter + Fetcher + 'static> {
    pub(super) config: Config,
    pub(super) api: Arc<A>,
    pub(super) shutdown: ShutdownSignal,
}

impl<A: Submitter + Fetcher + 'static> Pipeline<A> {
    pub fn new(config: Config, api: Arc<A>, shutdown: ShutdownSignal) -> Self {
        Self {
            config,
            api,
            shutdown,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process every input row not yet covered by the progress cursor.
    ///
    /// Submission is sequential; each flushed batch is fetched in its own
    /// task so one batch's wait never holds up the next. On interrupt the
    /// buffered batch is still submitted and the cursor saved.
    pub async fn run(&self, force_restart: bool) -> Result<RunSummary, PipelineError> {
        let paths = &self.config.paths;
        let files = list_input_files(&paths.input_dir)?;
        let tracker = if force_restart {
            info!("Force restart: ignoring saved progress");
            ProgressTracker::fresh(&paths.progress_file).await?
        } else {
            ProgressTracker::load(&paths.progress_file).await?
        };
        info!(
            files = files.len(),
            last_file = ?tracker.cursor().last_file,
            last_row = tracker.cursor().last_row_index,
            "Starting run"
        );

        let ledger_path = paths.ledger_path();
        let (ledger, ledger_task) = self.start_ledger(&ledger_path, &paths.store_root);
        let mut run = self.run_loop(tracker, ledger.clone());

        let outcome = run.process(&files).await;
        let mut summary = run.finish().await;
        summary.ledger_entries = finish_ledger(ledger, ledger_task).await;

        outcome?;
        info!(
            rows = summary.rows,
            stubs = summary.stubs,
            submitted = summary.submitted,
            saved = summary.fetch.saved,
            failed = summary.fetch.failed,
            pending = summary.fetch.pending,
            interrupted = summary.interrupted,
            "Run complete"
        );
        Ok(summary)
    }

    fn run_loop(&self, tracker: ProgressTracker, ledger: LedgerHandle) -> RunLoop<A> {
        let writer = ContentWriter::new(&self.config.paths.store_root);
        let reporter = FailureReporter::new(ledger, false);
        RunLoop {
            builder: TaskBuilder::from_config(&self.config),
            profile: self.config.submit.profile,
            writer: writer.clone(),
            submitter: BatchSubmitter::new(
                Arc::clone(&self.api),
                self.config.submit.batch_size,
                &self.config.paths.queue_dir,
            ),
            fetcher: self.fetcher(writer, reporter.clone()),
            reporter,
            shutdown: self.shutdown.clone(),
            tracker,
            buffer: BatchBuffer::new(self.config.submit.flush_threshold),
            contexts: HashMap::new(),
            in_flight: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Spawn a ledger writer for `ledger_path`, creating the CSV header first.
    pub(super) fn start_ledger(
        &self,
        ledger_path: &Path,
        store_root: &Path,
    ) -> (LedgerHandle, JoinHandle<u64>) {
        if self.config.ledger.csv_enabled {
            if let Err(e) = CsvLedger::new(ledger_path).initialize() {
                error!("Failed to initialize error ledger: {}", e);
            }
        }
        let sinks = configured_sinks(&self.config.ledger, ledger_path, store_root);
        let (handle, writer) = create_ledger_system(sinks, self.config.ledger.buffer_size);
        (handle, tokio::spawn(writer.run()))
    }

    pub(super) fn fetcher(&self, writer: ContentWriter, reporter: FailureReporter) -> ResultFetcher<A> {
        ResultFetcher::new(
            Arc::clone(&self.api),
            &self.config.fetch,
            writer,
            reporter,
            self.shutdown.clone(),
        )
    }
}

/// Drop the last handle and wait for the writer to drain.
pub(super) async fn finish_ledger(ledger: LedgerHandle, task: JoinHandle<u64>) -> u64 {
    drop(ledger);
    match task.await {
        Ok(received) => received,
        Err(e) => {
            error!("Ledger writer task failed: {}", e);
            0
        }
    }
}

/// State owned by one run. Only this loop touches the cursor.
struct RunLoop<A: Submitter + Fetcher + 'static> {
    builder: TaskBuilder,
    profile: FetchProfile,
    writer: ContentWriter,
    submitter: BatchSubmitter<A>,
    fetcher: ResultFetcher<A>,
    reporter: FailureReporter,
    shutdown: ShutdownSignal,
    tracker: ProgressTracker,
    buffer: BatchBuffer,
    /// Structured metadata for every buffered task, keyed by tag.
    contexts: HashMap<String, TaskContext>,
    in_flight: Vec<JoinHandle<FetchSummary>>,
    summary: RunSummary,
}

impl<A: Submitter + Fetcher + 'static> RunLoop<A> {
    async fn process(&mut self, files: &[InputFile]) -> Result<(), PipelineError> {
        for file in files {
            if self.shutdown.is_triggered() {
                self.summary.interrupted = true;
                break;
            }
            if self.tracker.cursor().should_skip_file(&file.name) {
                debug!(file = %file.name, "Already processed");
                self.summary.files_skipped += 1;
                continue;
            }

            let rows = match read_rows(&file.path) {
                Ok(rows) => rows,
                Err(e) => {
                    error!(file = %file.name, "Skipping unreadable input file: {}", e);
                    continue;
                }
            };
            self.summary.files += 1;
            info!(file = %file.name, rows = rows.len(), "Processing input file");

            self.process_file(file, rows).await?;
            if self.summary.interrupted {
                break;
            }
        }
        Ok(())
    }

    /// Buffer and flush the rows of one file.
    ///
    /// Rows are pulled one at a time; the signal is checked before each, and
    /// whatever was buffered before an interrupt is still submitted.
    async fn process_file(
        &mut self,
        file: &InputFile,
        rows: impl IntoIterator<Item = (usize, RawRow)>,
    ) -> Result<(), PipelineError> {
        let mut last_row = None;
        for (index, row) in rows {
            if self.tracker.cursor().should_skip_row(&file.name, index) {
                self.summary.rows_skipped += 1;
                continue;
            }
            if self.shutdown.is_triggered() {
                self.summary.interrupted = true;
                break;
            }
            self.summary.rows += 1;

            let record = NormalizedRecord::from_row(&row);
            match self.builder.build(&record, self.profile) {
                BuildOutcome::MetadataOnly { path, reason } => {
                    match self.writer.write_stub(&path, &record, &row).await {
                        Ok(_) => self.summary.stubs += 1,
                        Err(e) => {
                            error!(tag = %path, ?reason, "Failed to write stub: {}", e);
                            self.summary.stub_errors += 1;
                        }
                    }
                }
                BuildOutcome::Network(task) => {
                    let tag = task.tag.clone();
                    if self.buffer.push(task) {
                        self.contexts.insert(
                            tag,
                            TaskContext {
                                record,
                                issue_override: None,
                            },
                        );
                    } else {
                        self.summary.duplicates += 1;
                    }
                }
            }

            last_row = Some(index);
            if self.buffer.should_flush() {
                self.flush(file, index).await?;
            }
        }

        if let Some(row) = last_row {
            self.flush(file, row).await?;
        }
        if self.summary.interrupted {
            warn!(file = %file.name, row = ?last_row, "Interrupted; progress saved");
        }
        Ok(())
    }

    /// Submit the buffer, hand accepted tasks to a fetch task, save the cursor.
    async fn flush(&mut self, file: &InputFile, row: usize) -> Result<(), ProgressError> {
        let tasks = self.buffer.take();
        if !tasks.is_empty() {
            let report = self.submitter.submit(file.stem(), tasks).await;
            self.summary.submitted += report.submitted.len();
            self.summary.rejected += report.rejected.len();
            self.summary.submit_failed += report.failed_task_count();
            self.summary.unacknowledged += report.unacknowledged.len();

            let job = self
                .reporter
                .report_submission(report, &mut self.contexts)
                .await;

            if !job.is_empty() {
                let fetcher = self.fetcher.clone();
                self.in_flight
                    .push(tokio::spawn(async move { fetcher.run(job).await }));
            }
        }

        let row = i64::try_from(row).unwrap_or(i64::MAX);
        self.tracker.save(&file.name, row).await
    }

    /// Wait for every fetch task and close this run's ledger handles.
    async fn finish(self) -> RunSummary {
        let RunLoop {
            in_flight,
            mut summary,
            tracker,
            ..
        } = self;

        if !in_flight.is_empty() {
            info!(batches = in_flight.len(), "Waiting for in-flight fetches");
        }
        for handle in in_flight {
            match handle.await {
                Ok(fetched) => summary.fetch += fetched,
                Err(e) => error!("Fetch task failed: {}", e),
            }
        }
        summary.cursor = tracker.cursor().clone();
        summary
    }
}
