use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::task::{FetchProfile, UrlRule};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub submit: SubmitConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub thin_content: ThinContentConfig,
    /// Per-domain URL clean-up rules applied before submission.
    #[serde(default = "default_url_rules")]
    pub url_rules: Vec<UrlRule>,
    /// URLs on these domains are never crawled.
    #[serde(default = "default_search_engine_domains")]
    pub search_engine_domains: Vec<String>,
}

/// Crawling API connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Timeout for task creation requests in seconds (default: 120)
    #[serde(default = "default_request_timeout")]
    pub submit_timeout_secs: u64,
    /// Timeout for a single result fetch request in seconds (default: 120)
    #[serde(default = "default_request_timeout")]
    pub fetch_timeout_secs: u64,
}

impl ApiConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://api.dataforseo.com/v3".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    /// Raw submission responses are persisted here.
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,
    /// Root of the content store.
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,
    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,
    /// Error ledger file name, relative to `store_root`.
    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,
    /// Merged output of the primary and retry stores.
    #[serde(default = "default_final_store_root")]
    pub final_store_root: PathBuf,
}

impl PathsConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.store_root.join(&self.ledger_file)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            queue_dir: default_queue_dir(),
            store_root: default_store_root(),
            progress_file: default_progress_file(),
            ledger_file: default_ledger_file(),
            final_store_root: default_final_store_root(),
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("serp_outputs")
}

fn default_queue_dir() -> PathBuf {
    PathBuf::from("queued_tasks")
}

fn default_store_root() -> PathBuf {
    PathBuf::from("parsed_content_markdowns")
}

fn default_progress_file() -> PathBuf {
    PathBuf::from("parsing_progress.json")
}

fn default_ledger_file() -> String {
    "_error_summary.csv".to_string()
}

fn default_final_store_root() -> PathBuf {
    PathBuf::from("FINAL_DATABASE")
}

/// Task submission settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitConfig {
    /// Maximum tasks per task-creation request (API limit is 100).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Buffered task count that triggers an automatic flush.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    /// Fetch profile for the primary pipeline.
    #[serde(default = "default_profile")]
    pub profile: FetchProfile,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_threshold: default_flush_threshold(),
            profile: default_profile(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_threshold() -> usize {
    50
}

fn default_profile() -> FetchProfile {
    FetchProfile::Light
}

/// How results are collected after submission.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategyKind {
    /// Fetch right away, once.
    Immediate,
    /// Wait `delay_secs`, then fetch once.
    Delayed,
    /// Re-fetch unfinished tasks every `poll_interval_secs` until `poll_timeout_secs`.
    Poll,
}

/// Result fetching settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_strategy")]
    pub strategy: FetchStrategyKind,
    #[serde(default = "default_delay")]
    pub delay_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Maximum simultaneous fetch requests.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Tasks per fetch request.
    #[serde(default = "default_request_chunk")]
    pub request_chunk: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            delay_secs: default_delay(),
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
            max_concurrent: default_max_concurrent(),
            request_chunk: default_request_chunk(),
        }
    }
}

fn default_strategy() -> FetchStrategyKind {
    FetchStrategyKind::Delayed
}

fn default_delay() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    10
}

fn default_poll_timeout() -> u64 {
    1200 // 20 minutes
}

fn default_max_concurrent() -> usize {
    10
}

fn default_request_chunk() -> usize {
    20
}

/// Error ledger sinks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default = "default_true")]
    pub csv_enabled: bool,
    /// Per-suburb/per-type `warning.txt` / `error.txt` logs.
    #[serde(default = "default_true")]
    pub severity_log_enabled: bool,
    #[serde(default = "default_ledger_buffer")]
    pub buffer_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            csv_enabled: true,
            severity_log_enabled: true,
            buffer_size: default_ledger_buffer(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ledger_buffer() -> usize {
    1000
}

/// Ledger-driven retry settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_rank_group_min")]
    pub rank_group_min: u32,
    #[serde(default = "default_rank_group_max")]
    pub rank_group_max: u32,
    /// Record type must contain this substring.
    #[serde(default = "default_retry_type")]
    pub type_contains: String,
    /// Issue labels eligible for retry (case-insensitive).
    #[serde(default = "default_retry_issues")]
    pub issues: Vec<String>,
    /// Rows whose status or issue contains this text are also eligible.
    #[serde(default = "default_retry_status")]
    pub status_contains: String,
    /// Retried artifacts are written here, never over the primary store.
    #[serde(default = "default_retry_store")]
    pub store_root: PathBuf,
    /// Retry ledger file name, relative to the retry store root.
    #[serde(default = "default_retry_ledger")]
    pub ledger_file: String,
    #[serde(default = "default_retry_queue")]
    pub queue_dir: PathBuf,
    /// Fetch profile per retry generation; the last entry repeats.
    #[serde(default = "default_retry_profiles")]
    pub profiles: Vec<FetchProfile>,
}

impl RetryConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.store_root.join(&self.ledger_file)
    }

    /// Profile for a 1-based retry generation.
    pub fn profile_for_generation(&self, generation: u32) -> FetchProfile {
        let index = generation.saturating_sub(1) as usize;
        self.profiles
            .get(index)
            .or_else(|| self.profiles.last())
            .copied()
            .unwrap_or(FetchProfile::Deep)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rank_group_min: default_rank_group_min(),
            rank_group_max: default_rank_group_max(),
            type_contains: default_retry_type(),
            issues: default_retry_issues(),
            status_contains: default_retry_status(),
            store_root: default_retry_store(),
            ledger_file: default_retry_ledger(),
            queue_dir: default_retry_queue(),
            profiles: default_retry_profiles(),
        }
    }
}

fn default_rank_group_min() -> u32 {
    1
}

fn default_rank_group_max() -> u32 {
    5
}

fn default_retry_type() -> String {
    "organic".to_string()
}

fn default_retry_issues() -> Vec<String> {
    vec!["CRITICAL".to_string(), "ERROR".to_string()]
}

fn default_retry_status() -> String {
    "pending".to_string()
}

fn default_retry_store() -> PathBuf {
    PathBuf::from("parsed_content_markdowns2")
}

fn default_retry_ledger() -> String {
    "_retry_report.csv".to_string()
}

fn default_retry_queue() -> PathBuf {
    PathBuf::from("retry_tasks")
}

fn default_retry_profiles() -> Vec<FetchProfile> {
    vec![FetchProfile::Deep, FetchProfile::Light]
}

/// Undersized-artifact scan settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThinContentConfig {
    #[serde(default = "default_min_size")]
    pub min_size_bytes: u64,
    /// How many of the best-ranked thin artifacts are re-queued.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Only artifacts under a type directory containing this text are scanned.
    #[serde(default = "default_retry_type")]
    pub type_contains: String,
    /// Link-directory domains whose pages are thin by nature.
    #[serde(default = "default_excluded_domains")]
    pub excluded_domains: Vec<String>,
    /// Report file name, relative to the scanned store root.
    #[serde(default = "default_report_file")]
    pub report_file: String,
}

impl Default for ThinContentConfig {
    fn default() -> Self {
        Self {
            min_size_bytes: default_min_size(),
            top_n: default_top_n(),
            type_contains: default_retry_type(),
            excluded_domains: default_excluded_domains(),
            report_file: default_report_file(),
        }
    }
}

fn default_min_size() -> u64 {
    10 * 1024
}

fn default_top_n() -> usize {
    10
}

fn default_excluded_domains() -> Vec<String> {
    [
        "hipages.com.au",
        "yelp.com",
        "yelp.com.au",
        "yellowpages.com.au",
        "truelocal.com.au",
        "facebook.com",
        "instagram.com",
        "starofservice.com.au",
        "checkatrade.com",
        "buy.nsw.gov.au",
        "localsearch.com.au",
        "au.nextdoor.com",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

fn default_report_file() -> String {
    "_final_scan_report.csv".to_string()
}

fn default_url_rules() -> Vec<UrlRule> {
    vec![UrlRule {
        domain_contains: "empireroofing.com.au".to_string(),
        strip_suffix: ".php".to_string(),
    }]
}

fn default_search_engine_domains() -> Vec<String> {
    vec!["google.com".to_string()]
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub api: SanitizedApiConfig,
    pub paths: PathsConfig,
    pub submit: SubmitConfig,
    pub fetch: FetchConfig,
    pub ledger: LedgerConfig,
    pub retry: RetryConfig,
    pub thin_content: ThinContentConfig,
    pub url_rules: Vec<UrlRule>,
    pub search_engine_domains: Vec<String>,
}

/// Sanitized API config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedApiConfig {
    pub base_url: String,
    pub username: String,
    pub password_configured: bool,
    pub submit_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            api: SanitizedApiConfig {
                base_url: config.api.base_url.clone(),
                username: config.api.username.clone(),
                password_configured: !config.api.password.is_empty(),
                submit_timeout_secs: config.api.submit_timeout_secs,
                fetch_timeout_secs: config.api.fetch_timeout_secs,
            },
            paths: config.paths.clone(),
            submit: config.submit.clone(),
            fetch: config.fetch.clone(),
            ledger: config.ledger.clone(),
            retry: config.retry.clone(),
            thin_content: config.thin_content.clone(),
            url_rules: config.url_rules.clone(),
            search_engine_domains: config.search_engine_domains.clone(),
        }
    }
}
