//! Mock crawling API for testing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::{
    ApiError, FetchRequest, Fetcher, SubmitResponse, Submitter, TaskEnvelope, SUCCESS_STATUS_CODE,
};
use crate::task::TaskDescriptor;

/// How the mock answers a fetch for one tag.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// Finished crawl with one page of content.
    Finished,
    /// Success status with an empty result list.
    Empty,
    /// Finished crawl with zero pages crawled.
    CrawlFailed,
    /// Task-level error status.
    Status(i64, String),
    /// Crawl never finishes; reports this progress value.
    Pending(String),
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    tasks: HashMap<String, TaskDescriptor>,
    submit_calls: Vec<Vec<TaskDescriptor>>,
    fetch_calls: Vec<Vec<FetchRequest>>,
    outcomes: HashMap<String, MockOutcome>,
    /// Fetches left to answer as in-progress before the outcome applies.
    pending_rounds: HashMap<String, u32>,
    rejected_tags: HashSet<String>,
    dropped_tags: HashSet<String>,
    failing_submits: usize,
    failing_fetches: usize,
    /// Answer submits with this top-level status and no tasks.
    bare_submit_status: Option<(i64, String)>,
    echo_tags: bool,
}

/// Mock implementation of [`Submitter`] and [`Fetcher`].
///
/// Provides controllable behavior for testing:
/// - Sequential task ids, tag echo on or off
/// - Per-tag outcomes, rejections, and dropped results
/// - Failing submissions or fetches
/// - Recorded calls for assertions
#[derive(Debug, Clone)]
pub struct MockTaskApi {
    state: Arc<RwLock<MockState>>,
}

impl Default for MockTaskApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTaskApi {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState {
                echo_tags: true,
                ..MockState::default()
            })),
        }
    }

    /// Every submit call, in order.
    pub async fn submit_calls(&self) -> Vec<Vec<TaskDescriptor>> {
        self.state.read().await.submit_calls.clone()
    }

    /// Every fetch call, in order.
    pub async fn fetch_calls(&self) -> Vec<Vec<FetchRequest>> {
        self.state.read().await.fetch_calls.clone()
    }

    /// Tags of every submitted task, in submission order.
    pub async fn submitted_tags(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .submit_calls
            .iter()
            .flatten()
            .map(|t| t.tag.clone())
            .collect()
    }

    pub async fn set_outcome(&self, tag: impl Into<String>, outcome: MockOutcome) {
        self.state.write().await.outcomes.insert(tag.into(), outcome);
    }

    /// Answer the first `rounds` fetches for `tag` as in progress.
    pub async fn set_pending_rounds(&self, tag: impl Into<String>, rounds: u32) {
        self.state.write().await.pending_rounds.insert(tag.into(), rounds);
    }

    /// Refuse `tag` at creation time.
    pub async fn reject_tag(&self, tag: impl Into<String>) {
        self.state.write().await.rejected_tags.insert(tag.into());
    }

    /// Never return a result for `tag`.
    pub async fn drop_tag(&self, tag: impl Into<String>) {
        self.state.write().await.dropped_tags.insert(tag.into());
    }

    /// Fail the next `count` submit calls.
    pub async fn fail_next_submits(&self, count: usize) {
        self.state.write().await.failing_submits = count;
    }

    /// Fail the next `count` fetch calls.
    pub async fn fail_next_fetches(&self, count: usize) {
        self.state.write().await.failing_fetches = count;
    }

    /// Answer every submit with `status_code` / `message` and an empty
    /// `tasks` list, as the API does for account-level errors.
    pub async fn answer_submits_without_tasks(&self, status_code: i64, message: impl Into<String>) {
        self.state.write().await.bare_submit_status = Some((status_code, message.into()));
    }

    /// Whether responses carry the task tag.
    pub async fn set_echo_tags(&self, echo: bool) {
        self.state.write().await.echo_tags = echo;
    }
}

fn data(task: &TaskDescriptor, echo_tag: bool) -> Value {
    let mut data = json!({
        "api": "on_page",
        "function": "task_post",
        "target": task.target,
        "start_url": task.start_url,
    });
    if echo_tag {
        data["tag"] = json!(task.tag);
    }
    data
}

fn result_for(outcome: &MockOutcome, task: &TaskDescriptor) -> (i64, String, Value) {
    let ok = (SUCCESS_STATUS_CODE, "Ok.".to_string());
    match outcome {
        MockOutcome::Finished => (
            ok.0,
            ok.1,
            json!([{
                "crawl_progress": "finished",
                "crawl_status": {"pages_crawled": 1, "pages_in_queue": 0},
                "items": [{
                    "type": "content_parsing_element",
                    "fetch_time": "2024-05-01 10:00:00 +00:00",
                    "page_content": {
                        "header": null,
                        "main_topic": [{"h_title": task.target, "primary_content": [{"text": "Content"}]}]
                    }
                }]
            }]),
        ),
        MockOutcome::Empty => (ok.0, ok.1, json!([])),
        MockOutcome::CrawlFailed => (
            ok.0,
            ok.1,
            json!([{
                "crawl_progress": "finished",
                "crawl_status": {"pages_crawled": 0},
                "items": null
            }]),
        ),
        MockOutcome::Status(code, message) => (*code, message.clone(), Value::Null),
        MockOutcome::Pending(progress) => (
            ok.0,
            ok.1,
            json!([{"crawl_progress": progress, "crawl_status": {"pages_crawled": 0}}]),
        ),
    }
}

#[async_trait]
impl Submitter for MockTaskApi {
    async fn submit(&self, tasks: &[TaskDescriptor]) -> Result<SubmitResponse, ApiError> {
        let mut state = self.state.write().await;
        state.submit_calls.push(tasks.to_vec());
        if state.failing_submits > 0 {
            state.failing_submits -= 1;
            return Err(ApiError::ConnectionFailed("mock submit failure".to_string()));
        }
        if let Some((status_code, message)) = &state.bare_submit_status {
            return SubmitResponse::from_raw(json!({
                "status_code": status_code,
                "status_message": message,
                "tasks_count": 0,
                "tasks": []
            }));
        }

        let mut envelopes = Vec::with_capacity(tasks.len());
        for task in tasks {
            let echo = state.echo_tags;
            if state.rejected_tags.contains(&task.tag) {
                envelopes.push(json!({
                    "id": "",
                    "status_code": 40501,
                    "status_message": "Invalid Field: 'start_url'.",
                    "data": data(task, echo),
                    "result": null
                }));
                continue;
            }
            state.next_id += 1;
            let id = format!("mock-{:06}", state.next_id);
            state.tasks.insert(id.clone(), task.clone());
            envelopes.push(json!({
                "id": id,
                "status_code": 20100,
                "status_message": "Task Created.",
                "data": data(task, echo),
                "result": null
            }));
        }

        SubmitResponse::from_raw(json!({
            "status_code": SUCCESS_STATUS_CODE,
            "status_message": "Ok.",
            "tasks_count": envelopes.len(),
            "tasks": envelopes
        }))
    }
}

#[async_trait]
impl Fetcher for MockTaskApi {
    async fn fetch(&self, requests: &[FetchRequest]) -> Result<Vec<TaskEnvelope>, ApiError> {
        let mut state = self.state.write().await;
        state.fetch_calls.push(requests.to_vec());
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(ApiError::Timeout);
        }

        let mut envelopes = Vec::new();
        for request in requests {
            let Some(task) = state.tasks.get(&request.id).cloned() else {
                continue;
            };
            if state.dropped_tags.contains(&task.tag) {
                continue;
            }

            let outcome = match state.pending_rounds.get_mut(&task.tag) {
                Some(rounds) if *rounds > 0 => {
                    *rounds -= 1;
                    MockOutcome::Pending("in_progress".to_string())
                }
                _ => state
                    .outcomes
                    .get(&task.tag)
                    .cloned()
                    .unwrap_or(MockOutcome::Finished),
            };
            let (status_code, status_message, result) = result_for(&outcome, &task);
            let envelope = json!({
                "id": request.id,
                "status_code": status_code,
                "status_message": status_message,
                "data": data(&task, state.echo_tags),
                "result": result
            });
            envelopes.push(
                serde_json::from_value(envelope)
                    .map_err(|e| ApiError::InvalidResponse(e.to_string()))?,
            );
        }
        Ok(envelopes)
    }
}
