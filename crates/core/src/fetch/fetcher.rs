use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{validate_envelope, FetchJob, FetchStrategy, FetchSummary};
use crate::api::{ApiError, FetchRequest, Fetcher, TaskEnvelope};
use crate::config::FetchConfig;
use crate::ledger::{FailureCategory, FailureReporter, Issue};
use crate::record::{decode_tag, ArtifactPath, NormalizedRecord};
use crate::shutdown::ShutdownSignal;
use crate::store::ContentWriter;
use crate::submit::SubmittedTask;

const TIMED_OUT: &str = "timeout";
const INTERRUPTED: &str = "interrupted";

/// Collects results for submitted tasks and routes each one to the content
/// store or the ledger.
///
/// Clones share the concurrency limiter, so the cap on outstanding requests
/// holds across every batch in flight.
pub struct ResultFetcher<F: Fetcher> {
    api: Arc<F>,
    strategy: FetchStrategy,
    request_chunk: usize,
    limiter: Arc<Semaphore>,
    writer: ContentWriter,
    reporter: FailureReporter,
    shutdown: ShutdownSignal,
}

impl<F: Fetcher> Clone for ResultFetcher<F> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            strategy: self.strategy,
            request_chunk: self.request_chunk,
            limiter: Arc::clone(&self.limiter),
            writer: self.writer.clone(),
            reporter: self.reporter.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Outcome of one request for one chunk of tasks.
struct ChunkOutcome {
    tasks: Vec<SubmittedTask>,
    result: Result<Vec<TaskEnvelope>, ApiError>,
}

impl<F: Fetcher + 'static> ResultFetcher<F> {
    pub fn new(
        api: Arc<F>,
        config: &FetchConfig,
        writer: ContentWriter,
        reporter: FailureReporter,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            api,
            strategy: FetchStrategy::from_config(config),
            request_chunk: config.request_chunk.max(1),
            limiter: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            writer,
            reporter,
            shutdown,
        }
    }

    pub fn with_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> FetchStrategy {
        self.strategy
    }

    /// Collect every task in `job`.
    ///
    /// Never blocks past the configured wait and timeout. Tasks still
    /// unfinished at the end are filed as pending.
    pub async fn run(&self, job: FetchJob) -> FetchSummary {
        let mut summary = FetchSummary {
            requested: job.tasks.len(),
            ..FetchSummary::default()
        };
        if job.is_empty() {
            return summary;
        }

        let id_to_tag: HashMap<&str, &str> = job
            .tasks
            .iter()
            .map(|t| (t.id.as_str(), t.tag.as_str()))
            .collect();
        let mut last_progress: HashMap<String, String> = HashMap::new();
        let mut pending = job.tasks.clone();

        let delay = self.strategy.initial_delay();
        if !delay.is_zero() {
            info!(tasks = pending.len(), delay_secs = delay.as_secs(), "Waiting before fetch");
            if !self.shutdown.sleep(delay).await {
                self.abandon(&job, &pending, &last_progress, INTERRUPTED, &mut summary)
                    .await;
                return summary;
            }
        }

        let deadline = match self.strategy {
            FetchStrategy::Poll { timeout, .. } => Some(Instant::now() + timeout),
            _ => None,
        };

        loop {
            let keep_polling = deadline.is_some_and(|d| Instant::now() < d);
            let mut unfinished = Vec::new();

            for outcome in self.fetch_round(&pending).await {
                match outcome.result {
                    Err(e) if keep_polling => {
                        warn!(tasks = outcome.tasks.len(), error = %e, "Fetch failed, will retry");
                        unfinished.extend(outcome.tasks);
                    }
                    Err(e) => {
                        error!(tasks = outcome.tasks.len(), error = %e, "Fetch failed");
                        let category = FailureCategory::ApiError(e.to_string());
                        for task in &outcome.tasks {
                            self.fail(&job, &task.tag, &task.url, &category, &mut summary)
                                .await;
                        }
                    }
                    Ok(envelopes) => {
                        let mut answered: HashSet<String> = HashSet::new();
                        for envelope in &envelopes {
                            let Some(tag) = envelope
                                .tag()
                                .or_else(|| id_to_tag.get(envelope.id.as_str()).copied())
                                .map(str::to_string)
                            else {
                                warn!(id = %envelope.id, "No tag found in result");
                                summary.unaccounted += 1;
                                continue;
                            };
                            answered.insert(tag.clone());

                            match validate_envelope(envelope) {
                                Ok(()) => self.save(&job, &tag, envelope, &mut summary).await,
                                Err(FailureCategory::Pending(progress)) if keep_polling => {
                                    debug!(tag = %tag, progress = %progress, "Crawl not finished");
                                    last_progress.insert(tag.clone(), progress);
                                    if let Some(task) =
                                        outcome.tasks.iter().find(|t| t.tag == tag)
                                    {
                                        unfinished.push(task.clone());
                                    }
                                }
                                Err(category) => {
                                    let url = envelope
                                        .data
                                        .target_url()
                                        .map(str::to_string)
                                        .or_else(|| {
                                            outcome
                                                .tasks
                                                .iter()
                                                .find(|t| t.tag == tag)
                                                .map(|t| t.url.clone())
                                        })
                                        .unwrap_or_default();
                                    self.fail(&job, &tag, &url, &category, &mut summary).await;
                                }
                            }
                        }

                        for task in outcome.tasks {
                            if answered.contains(&task.tag) {
                                continue;
                            }
                            if keep_polling {
                                unfinished.push(task);
                            } else {
                                let category =
                                    FailureCategory::Unknown("no result returned".to_string());
                                self.fail(&job, &task.tag, &task.url, &category, &mut summary)
                                    .await;
                            }
                        }
                    }
                }
            }

            if unfinished.is_empty() {
                break;
            }
            let (FetchStrategy::Poll { interval, .. }, Some(deadline)) = (self.strategy, deadline)
            else {
                break;
            };
            if Instant::now() >= deadline {
                warn!(tasks = unfinished.len(), "Polling timed out");
                self.abandon(&job, &unfinished, &last_progress, TIMED_OUT, &mut summary)
                    .await;
                break;
            }
            info!(tasks = unfinished.len(), "Waiting for unfinished tasks");
            if !self.shutdown.sleep(interval).await {
                self.abandon(&job, &unfinished, &last_progress, INTERRUPTED, &mut summary)
                    .await;
                break;
            }
            pending = unfinished;
        }

        info!(
            requested = summary.requested,
            saved = summary.saved,
            failed = summary.failed,
            pending = summary.pending,
            "Fetch complete"
        );
        summary
    }

    /// One request per chunk, at most `max_concurrent` in flight.
    async fn fetch_round(&self, tasks: &[SubmittedTask]) -> Vec<ChunkOutcome> {
        let requests = tasks.chunks(self.request_chunk).map(|chunk| {
            let api = Arc::clone(&self.api);
            let limiter = Arc::clone(&self.limiter);
            let chunk = chunk.to_vec();
            async move {
                let payload: Vec<FetchRequest> = chunk
                    .iter()
                    .map(|t| FetchRequest {
                        id: t.id.clone(),
                        url: t.url.clone(),
                    })
                    .collect();
                let result = match limiter.acquire_owned().await {
                    Ok(_permit) => api.fetch(&payload).await,
                    Err(_) => Err(ApiError::ConnectionFailed("request limiter closed".to_string())),
                };
                ChunkOutcome {
                    tasks: chunk,
                    result,
                }
            }
        });
        join_all(requests).await
    }

    /// Write a valid result. A result that cannot be placed is filed.
    async fn save(
        &self,
        job: &FetchJob,
        tag: &str,
        envelope: &TaskEnvelope,
        summary: &mut FetchSummary,
    ) {
        let artifact = ArtifactPath::parse_tag(tag).or_else(|| {
            job.contexts
                .get(tag)
                .map(|context| ArtifactPath::for_record(&context.record))
        });
        let failure = match artifact {
            Some(artifact) => match self.writer.write_result(&artifact, envelope).await {
                Ok(path) => {
                    debug!(tag = %tag, path = %path.display(), "Result saved");
                    summary.saved += 1;
                    return;
                }
                Err(e) => e.to_string(),
            },
            None => "tag is not a valid artifact path".to_string(),
        };

        error!(tag = %tag, "Failed to save result: {}", failure);
        summary.write_errors += 1;
        let url = envelope.data.target_url().unwrap_or_default();
        let category = FailureCategory::StoreFailed(failure);
        if let Some((record, issue_override)) = self.record_for(job, tag, url) {
            self.reporter.report(&record, &category, issue_override).await;
        } else {
            warn!(tag = %tag, "Cannot recover record metadata: {}", category);
        }
    }

    async fn fail(
        &self,
        job: &FetchJob,
        tag: &str,
        url: &str,
        category: &FailureCategory,
        summary: &mut FetchSummary,
    ) {
        let Some((record, issue_override)) = self.record_for(job, tag, url) else {
            warn!(tag = %tag, "Cannot recover record metadata: {}", category);
            summary.unaccounted += 1;
            return;
        };

        self.reporter.report(&record, category, issue_override).await;
        if category.is_pending() {
            summary.pending += 1;
        } else {
            summary.failed += 1;
        }
    }

    /// Structured metadata for `tag`, or the record decoded from it.
    fn record_for<'j>(
        &self,
        job: &'j FetchJob,
        tag: &str,
        url: &str,
    ) -> Option<(NormalizedRecord, Option<&'j Issue>)> {
        match job.contexts.get(tag) {
            Some(context) => Some((context.record.clone(), context.issue_override.as_ref())),
            None => decode_tag(tag, url).map(|record| (record, None)),
        }
    }

    /// File every task in `tasks` as pending.
    async fn abandon(
        &self,
        job: &FetchJob,
        tasks: &[SubmittedTask],
        last_progress: &HashMap<String, String>,
        reason: &str,
        summary: &mut FetchSummary,
    ) {
        warn!(tasks = tasks.len(), reason, "Logging unfinished tasks as pending");
        for task in tasks {
            let progress = last_progress
                .get(&task.tag)
                .cloned()
                .unwrap_or_else(|| reason.to_string());
            let category = FailureCategory::Pending(progress);
            self.fail(job, &task.tag, &task.url, &category, summary).await;
        }
    }
}
