use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::{ApiError, Submitter, TaskEnvelope};
use crate::ledger::FailureCategory;
use crate::store::to_indented_json;
use crate::task::TaskDescriptor;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Batch {index} submission failed: {source}")]
    Chunk {
        index: usize,
        #[source]
        source: ApiError,
    },

    #[error("Failed to persist submission response to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read queued submission {path}: {message}")]
    Queue { path: PathBuf, message: String },
}

/// A task the API accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTask {
    pub id: String,
    pub url: String,
    pub tag: String,
}

/// A task the API refused inside an otherwise successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTask {
    pub tag: String,
    pub url: String,
    pub status_code: i64,
    pub message: String,
}

/// A task a successful request answered nothing for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnacknowledgedTask {
    pub tag: String,
    pub url: String,
    /// Account-level error of the response, if it carried one.
    pub request_error: Option<String>,
}

impl UnacknowledgedTask {
    pub fn category(&self) -> FailureCategory {
        match &self.request_error {
            Some(message) => FailureCategory::ApiError(message.clone()),
            None => FailureCategory::Unknown(NOT_ACKNOWLEDGED.to_string()),
        }
    }
}

/// Detail filed for a task no response mentioned.
pub const NOT_ACKNOWLEDGED: &str = "not acknowledged by the API";

/// A chunk whose request failed as a whole.
#[derive(Debug)]
pub struct FailedChunk {
    pub index: usize,
    pub tasks: Vec<TaskDescriptor>,
    pub error: SubmitError,
}

/// Result of one [`BatchSubmitter::submit`] call.
#[derive(Debug, Default)]
pub struct SubmitReport {
    pub submitted: Vec<SubmittedTask>,
    pub rejected: Vec<RejectedTask>,
    pub failed: Vec<FailedChunk>,
    pub unacknowledged: Vec<UnacknowledgedTask>,
    /// Persisted raw responses, one per successful chunk.
    pub responses: Vec<PathBuf>,
}

impl SubmitReport {
    pub fn failed_task_count(&self) -> usize {
        self.failed.iter().map(|c| c.tasks.len()).sum()
    }
}

/// Posts descriptors in chunks of at most `batch_size`.
pub struct BatchSubmitter<S: Submitter> {
    api: Arc<S>,
    batch_size: usize,
    queue_dir: PathBuf,
    last_stamp: AtomicI64,
}

impl<S: Submitter> BatchSubmitter<S> {
    pub fn new(api: Arc<S>, batch_size: usize, queue_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            batch_size: batch_size.max(1),
            queue_dir: queue_dir.into(),
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    /// Submit `tasks` for the input file `source_stem`.
    ///
    /// Chunks are posted sequentially. A failed chunk is reported whole and
    /// does not affect the others.
    pub async fn submit(&self, source_stem: &str, tasks: Vec<TaskDescriptor>) -> SubmitReport {
        let mut report = SubmitReport::default();

        for (index, chunk) in tasks.chunks(self.batch_size).enumerate() {
            match self.api.submit(chunk).await {
                Ok(response) => {
                    match self.persist(source_stem, &response.raw).await {
                        Ok(path) => report.responses.push(path),
                        Err(e) => error!(batch = index, "{}", e),
                    }
                    let (accepted, rejected) = map_tasks(chunk, &response.tasks);
                    let missing = unacknowledged(chunk, &accepted, &rejected, response.request_error());
                    info!(
                        batch = index,
                        accepted = accepted.len(),
                        rejected = rejected.len(),
                        unacknowledged = missing.len(),
                        "Posted batch of {} tasks",
                        chunk.len()
                    );
                    if !missing.is_empty() {
                        warn!(
                            batch = index,
                            status = response.status_code,
                            "{} tasks missing from the response: {}",
                            missing.len(),
                            response.status_message
                        );
                    }
                    report.submitted.extend(accepted);
                    report.rejected.extend(rejected);
                    report.unacknowledged.extend(missing);
                }
                Err(source) => {
                    warn!(batch = index, tasks = chunk.len(), error = %source, "Batch post failed");
                    report.failed.push(FailedChunk {
                        index,
                        tasks: chunk.to_vec(),
                        error: SubmitError::Chunk { index, source },
                    });
                }
            }
        }

        report
    }

    async fn persist(&self, source_stem: &str, raw: &serde_json::Value) -> Result<PathBuf, SubmitError> {
        let path = self
            .queue_dir
            .join(format!("{}_{}.json", source_stem, self.next_stamp()));
        let persist_err = |source| SubmitError::Persist {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.queue_dir)
            .await
            .map_err(persist_err)?;
        let bytes = to_indented_json(raw)
            .map_err(|e| persist_err(std::io::Error::other(e.to_string())))?;
        tokio::fs::write(&path, bytes).await.map_err(persist_err)?;
        Ok(path)
    }

    /// Millisecond timestamp, strictly increasing across calls.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .last_stamp
                .compare_exchange(last, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

/// Pair each returned envelope with its descriptor.
///
/// The echoed tag wins; if the server dropped it, the envelope at position
/// `i` belongs to descriptor `i`.
fn map_tasks(
    chunk: &[TaskDescriptor],
    envelopes: &[TaskEnvelope],
) -> (Vec<SubmittedTask>, Vec<RejectedTask>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for (position, envelope) in envelopes.iter().enumerate() {
        let descriptor = chunk.get(position);
        let Some(tag) = envelope
            .tag()
            .map(str::to_string)
            .or_else(|| descriptor.map(|d| d.tag.clone()))
        else {
            warn!(id = %envelope.id, "Submitted task has no tag");
            continue;
        };
        let url = envelope
            .data
            .target_url()
            .map(str::to_string)
            .or_else(|| descriptor.map(|d| d.start_url.clone()))
            .unwrap_or_default();

        if envelope.is_rejected() || envelope.id.is_empty() {
            warn!(tag = %tag, code = envelope.status_code, "Task rejected: {}", envelope.status_message);
            rejected.push(RejectedTask {
                tag,
                url,
                status_code: envelope.status_code,
                message: envelope.status_message.clone(),
            });
            continue;
        }

        accepted.push(SubmittedTask {
            id: envelope.id.clone(),
            url,
            tag,
        });
    }

    (accepted, rejected)
}

/// Descriptors of `chunk` that neither list mentions.
fn unacknowledged(
    chunk: &[TaskDescriptor],
    accepted: &[SubmittedTask],
    rejected: &[RejectedTask],
    request_error: Option<String>,
) -> Vec<UnacknowledgedTask> {
    let seen: HashSet<&str> = accepted
        .iter()
        .map(|t| t.tag.as_str())
        .chain(rejected.iter().map(|t| t.tag.as_str()))
        .collect();
    chunk
        .iter()
        .filter(|d| !seen.contains(d.tag.as_str()))
        .map(|d| UnacknowledgedTask {
            tag: d.tag.clone(),
            url: d.start_url.clone(),
            request_error: request_error.clone(),
        })
        .collect()
}
