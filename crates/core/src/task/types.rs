//! Task descriptor and fetch profile types.

use serde::{Deserialize, Serialize};

/// Named preset of crawl parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FetchProfile {
    /// Full browser rendering with JavaScript, resources, and anti-bot evasion.
    Deep,
    /// Plain fetch on a fresh egress path.
    Light,
    /// No network task; a stub artifact is written instead.
    MetadataOnly,
}

impl FetchProfile {
    /// Whether this profile produces a network task.
    pub fn is_network(self) -> bool {
        !matches!(self, FetchProfile::MetadataOnly)
    }

    /// Request parameters for this profile.
    pub fn crawl_params(self) -> CrawlParams {
        match self {
            FetchProfile::Deep => CrawlParams {
                enable_javascript: Some(true),
                load_resources: Some(true),
                enable_browser_rendering: Some(true),
                enable_xhr: Some(true),
                disable_cookie_popup: Some(true),
                use_advanced_anti_robot_protection: Some(true),
                browser_preset: Some("desktop".to_string()),
                browser_wait_until: Some("fully_loaded".to_string()),
                wait_for_content_timeout: Some(30),
                switch_pool: None,
                proxy_country: Some("AU".to_string()),
            },
            FetchProfile::Light => CrawlParams {
                enable_javascript: Some(false),
                enable_browser_rendering: Some(false),
                enable_xhr: Some(false),
                switch_pool: Some(true),
                proxy_country: Some("AU".to_string()),
                ..CrawlParams::default()
            },
            FetchProfile::MetadataOnly => CrawlParams::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchProfile::Deep => "deep",
            FetchProfile::Light => "light",
            FetchProfile::MetadataOnly => "metadata_only",
        }
    }
}

impl std::fmt::Display for FetchProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional crawl switches; unset fields are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_javascript: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_resources: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_browser_rendering: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_xhr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_cookie_popup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_advanced_anti_robot_protection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_wait_until: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_content_timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_pool: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_country: Option<String>,
}

/// One task for the task-creation endpoint.
///
/// `tag` is the artifact's relative path and must come back unchanged with
/// the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDescriptor {
    /// Bare domain of the start URL.
    pub target: String,
    pub start_url: String,
    /// Mirror of `start_url`; some endpoints read `url` instead.
    pub url: String,
    pub enable_content_parsing: bool,
    pub max_crawl_pages: u32,
    #[serde(skip)]
    pub fetch_profile: FetchProfile,
    #[serde(flatten)]
    pub params: CrawlParams,
    pub tag: String,
}
