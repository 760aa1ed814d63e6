//! Record to task descriptor conversion.

use tracing::debug;

use super::types::{FetchProfile, TaskDescriptor};
use super::url_rules::{normalize_url, UrlRule};
use crate::config::Config;
use crate::record::{bare_host, ArtifactPath, NormalizedRecord};

/// Why a record was routed to the metadata-only path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataReason {
    NoUrl,
    /// The URL is not an http(s) address.
    Unreachable,
    SearchEngine,
    /// The caller asked for [`FetchProfile::MetadataOnly`].
    Profile,
}

/// What to do with one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Network(TaskDescriptor),
    /// No network task; the caller writes a stub artifact at `path`.
    MetadataOnly {
        path: ArtifactPath,
        reason: MetadataReason,
    },
}

impl BuildOutcome {
    pub fn tag(&self) -> String {
        match self {
            BuildOutcome::Network(task) => task.tag.clone(),
            BuildOutcome::MetadataOnly { path, .. } => path.tag(),
        }
    }
}

/// Builds task descriptors from normalized records.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    url_rules: Vec<UrlRule>,
    search_engine_domains: Vec<String>,
}

impl TaskBuilder {
    pub fn new(url_rules: Vec<UrlRule>, search_engine_domains: Vec<String>) -> Self {
        Self {
            url_rules,
            search_engine_domains: search_engine_domains
                .into_iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.url_rules.clone(),
            config.search_engine_domains.clone(),
        )
    }

    /// Whether a URL on this host belongs to a search engine.
    pub fn is_search_engine(&self, url: &str) -> bool {
        let host = bare_host(url);
        self.search_engine_domains
            .iter()
            .any(|domain| host.contains(domain.as_str()))
    }

    /// Reason a URL cannot be crawled, if any.
    pub fn metadata_reason(&self, url: &str) -> Option<MetadataReason> {
        let url = url.trim();
        if url.is_empty() {
            Some(MetadataReason::NoUrl)
        } else if !url.to_ascii_lowercase().starts_with("http") {
            Some(MetadataReason::Unreachable)
        } else if self.is_search_engine(url) {
            Some(MetadataReason::SearchEngine)
        } else {
            None
        }
    }

    /// Build the outcome for a record using its own artifact path.
    pub fn build(&self, record: &NormalizedRecord, profile: FetchProfile) -> BuildOutcome {
        self.build_at(record, profile, ArtifactPath::for_record(record))
    }

    /// Build the outcome for a record whose artifact path is already known.
    pub fn build_at(
        &self,
        record: &NormalizedRecord,
        profile: FetchProfile,
        path: ArtifactPath,
    ) -> BuildOutcome {
        let reason = if profile.is_network() {
            self.metadata_reason(&record.url)
        } else {
            Some(MetadataReason::Profile)
        };

        if let Some(reason) = reason {
            debug!(tag = %path, ?reason, "Metadata-only record");
            return BuildOutcome::MetadataOnly { path, reason };
        }

        let start_url = normalize_url(&self.url_rules, &record.url);
        BuildOutcome::Network(TaskDescriptor {
            target: bare_host(&start_url),
            url: start_url.clone(),
            start_url,
            enable_content_parsing: true,
            max_crawl_pages: 1,
            fetch_profile: profile,
            params: profile.crawl_params(),
            tag: path.tag(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> TaskBuilder {
        TaskBuilder::new(
            vec![UrlRule {
                domain_contains: "empireroofing.com.au".to_string(),
                strip_suffix: ".php".to_string(),
            }],
            vec!["google.com".to_string()],
        )
    }

    fn record(url: &str) -> NormalizedRecord {
        NormalizedRecord {
            record_type: "organic".to_string(),
            url: url.to_string(),
            suburb: "Bondi Beach".to_string(),
            service: "Roofing".to_string(),
            rank_absolute: "3".to_string(),
            rank_group: "2".to_string(),
            domain: String::new(),
        }
    }

    #[test]
    fn test_network_task_for_crawlable_url() {
        let outcome = builder().build(&record("https://Example.com.au/page"), FetchProfile::Deep);
        let BuildOutcome::Network(task) = outcome else {
            panic!("expected network task");
        };
        assert_eq!(task.tag, "Bondi-Beach/organic/type-organic_rg2_ra3_example.md");
        assert_eq!(task.target, "example.com.au");
        assert_eq!(task.start_url, "https://Example.com.au/page");
        assert_eq!(task.url, task.start_url);
        assert_eq!(task.max_crawl_pages, 1);
        assert!(task.enable_content_parsing);
        assert_eq!(task.params.enable_javascript, Some(true));
    }

    #[test]
    fn test_url_rule_applied_to_start_url() {
        let outcome = builder().build(
            &record("https://empireroofing.com.au/gutters.php"),
            FetchProfile::Light,
        );
        let BuildOutcome::Network(task) = outcome else {
            panic!("expected network task");
        };
        assert_eq!(task.start_url, "https://empireroofing.com.au/gutters");
        assert_eq!(task.target, "empireroofing.com.au");
    }

    #[test]
    fn test_empty_url_is_metadata_only() {
        let outcome = builder().build(&record(""), FetchProfile::Deep);
        assert!(matches!(
            outcome,
            BuildOutcome::MetadataOnly {
                reason: MetadataReason::NoUrl,
                ..
            }
        ));
        assert_eq!(
            outcome.tag(),
            "Bondi-Beach/organic/type-organic_rg2_ra3_metadata.md"
        );
    }

    #[test]
    fn test_search_engine_and_non_http_are_metadata_only() {
        let b = builder();
        assert!(matches!(
            b.build(&record("https://www.google.com/maps/place/x"), FetchProfile::Light),
            BuildOutcome::MetadataOnly {
                reason: MetadataReason::SearchEngine,
                ..
            }
        ));
        assert!(matches!(
            b.build(&record("tel:0400000000"), FetchProfile::Light),
            BuildOutcome::MetadataOnly {
                reason: MetadataReason::Unreachable,
                ..
            }
        ));
    }

    #[test]
    fn test_metadata_only_profile_never_builds_network_task() {
        let outcome = builder().build(&record("https://example.com"), FetchProfile::MetadataOnly);
        assert!(matches!(
            outcome,
            BuildOutcome::MetadataOnly {
                reason: MetadataReason::Profile,
                ..
            }
        ));
    }
}
