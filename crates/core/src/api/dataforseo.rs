//! HTTP client for the DataForSEO on-page endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;
use crate::task::TaskDescriptor;

use super::{
    ApiError, FetchRequest, Fetcher, ResponseBody, SubmitResponse, Submitter, TaskEnvelope,
};

const TASK_POST_PATH: &str = "on_page/task_post";
const CONTENT_PARSING_PATH: &str = "on_page/content_parsing";
const USER_AGENT: &str = concat!("harvest/", env!("CARGO_PKG_VERSION"));

/// Crawling API client authenticated with HTTP basic auth.
pub struct DataForSeoClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    submit_timeout: Duration,
    fetch_timeout: Duration,
}

impl DataForSeoClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::ConnectionFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            submit_timeout: config.submit_timeout(),
            fetch_timeout: config.fetch_timeout(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(path);
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status,
                body: body.chars().take(200).collect(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

fn map_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if e.is_connect() {
        ApiError::ConnectionFailed(e.to_string())
    } else {
        ApiError::InvalidResponse(e.to_string())
    }
}

#[async_trait]
impl Submitter for DataForSeoClient {
    async fn submit(&self, tasks: &[TaskDescriptor]) -> Result<SubmitResponse, ApiError> {
        let raw = self
            .post_json(TASK_POST_PATH, tasks, self.submit_timeout)
            .await?;
        SubmitResponse::from_raw(raw)
    }
}

#[async_trait]
impl Fetcher for DataForSeoClient {
    async fn fetch(&self, requests: &[FetchRequest]) -> Result<Vec<TaskEnvelope>, ApiError> {
        let raw = self
            .post_json(CONTENT_PARSING_PATH, requests, self.fetch_timeout)
            .await?;
        let body: ResponseBody = serde_json::from_value(raw)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(body.tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            base_url: "https://api.example.test/v3/".to_string(),
            username: "user".to_string(),
            password: "secret".to_string(),
            submit_timeout_secs: 5,
            fetch_timeout_secs: 7,
        }
    }

    #[test]
    fn test_endpoints_join_base_url() {
        let client = DataForSeoClient::new(&config()).unwrap();
        assert_eq!(
            client.endpoint(TASK_POST_PATH),
            "https://api.example.test/v3/on_page/task_post"
        );
        assert_eq!(
            client.endpoint(CONTENT_PARSING_PATH),
            "https://api.example.test/v3/on_page/content_parsing"
        );
        assert_eq!(client.submit_timeout, Duration::from_secs(5));
        assert_eq!(client.fetch_timeout, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let mut cfg = config();
        cfg.base_url = "http://127.0.0.1:1".to_string();
        let client = DataForSeoClient::new(&cfg).unwrap();

        let err = client.fetch(&[]).await.unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err:?}");
    }
}
