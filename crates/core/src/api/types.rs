//! Wire types and capability traits for the crawling API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::task::TaskDescriptor;

/// Status code the API uses for a successful task.
pub const SUCCESS_STATUS_CODE: i64 = 20000;

/// Status codes at or above this value mark a task the API rejected.
pub const TASK_ERROR_STATUS_CODE: i64 = 40000;

/// Errors from the crawling API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// True for failures where the endpoint was never reached or never answered.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Timeout | ApiError::ConnectionFailed(_))
    }
}

/// Echoed request data inside a task envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl TaskData {
    /// Start URL, falling back to the mirrored `url` field.
    pub fn target_url(&self) -> Option<&str> {
        self.start_url
            .as_deref()
            .or(self.url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

/// One entry of a response's `tasks[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub status_message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: TaskData,
    #[serde(default)]
    pub result: Option<Vec<Value>>,
    /// Remaining fields, kept so a saved envelope matches what was received.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl TaskEnvelope {
    pub fn tag(&self) -> Option<&str> {
        self.data.tag.as_deref().filter(|t| !t.is_empty())
    }

    /// Whether the API rejected this task outright.
    pub fn is_rejected(&self) -> bool {
        self.status_code >= TASK_ERROR_STATUS_CODE
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level response body shared by both endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub status_message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<TaskEnvelope>,
}

/// Response of the task-creation endpoint.
#[derive(Debug, Clone)]
pub struct SubmitResponse {
    /// Raw body as received, persisted for audit.
    pub raw: Value,
    pub status_code: i64,
    pub status_message: String,
    pub tasks: Vec<TaskEnvelope>,
}

impl SubmitResponse {
    /// Decode a raw response body.
    pub fn from_raw(raw: Value) -> Result<Self, ApiError> {
        let body: ResponseBody = serde_json::from_value(raw.clone())
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(Self {
            raw,
            status_code: body.status_code,
            status_message: body.status_message,
            tasks: body.tasks,
        })
    }

    /// Account-level error reported with an HTTP success, as `"{code} {message}"`.
    pub fn request_error(&self) -> Option<String> {
        (self.status_code >= TASK_ERROR_STATUS_CODE)
            .then(|| format!("{} {}", self.status_code, self.status_message).trim().to_string())
    }
}

/// One `{id, url}` pair for the result endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub id: String,
    pub url: String,
}

/// Creates crawl tasks.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submit one chunk of descriptors in a single request.
    async fn submit(&self, tasks: &[TaskDescriptor]) -> Result<SubmitResponse, ApiError>;
}

/// Retrieves crawl results.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch results for the given tasks in a single request.
    async fn fetch(&self, requests: &[FetchRequest]) -> Result<Vec<TaskEnvelope>, ApiError>;
}
