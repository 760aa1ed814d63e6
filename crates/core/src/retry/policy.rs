use crate::config::RetryConfig;
use crate::ledger::ErrorRecord;

/// Declarative filter over ledger rows.
///
/// A row is selected when all of these hold: its rank group parses into the
/// window, its type contains the configured text, its issue is listed (or
/// its status or issue mentions the pending marker), and its URL is an
/// external http(s) address.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    rank_group_min: u32,
    rank_group_max: u32,
    type_contains: String,
    issues: Vec<String>,
    status_contains: String,
    search_engine_domains: Vec<String>,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig, search_engine_domains: &[String]) -> Self {
        Self {
            rank_group_min: config.rank_group_min,
            rank_group_max: config.rank_group_max,
            type_contains: config.type_contains.to_lowercase(),
            issues: config.issues.iter().map(|i| i.trim().to_uppercase()).collect(),
            status_contains: config.status_contains.to_lowercase(),
            search_engine_domains: search_engine_domains
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, row: &ErrorRecord) -> bool {
        self.in_rank_window(&row.rank_group)
            && row.record_type.to_lowercase().contains(&self.type_contains)
            && self.is_eligible_issue(row)
            && self.is_external_url(&row.url)
    }

    fn in_rank_window(&self, rank_group: &str) -> bool {
        rank_group
            .trim()
            .parse::<u32>()
            .is_ok_and(|rg| (self.rank_group_min..=self.rank_group_max).contains(&rg))
    }

    fn is_eligible_issue(&self, row: &ErrorRecord) -> bool {
        let issue = row.issue.original().label();
        if self.issues.contains(&issue.trim().to_uppercase()) {
            return true;
        }
        !self.status_contains.is_empty()
            && (row.status.to_lowercase().contains(&self.status_contains)
                || issue.to_lowercase().contains(&self.status_contains))
    }

    fn is_external_url(&self, url: &str) -> bool {
        let url = url.trim().to_lowercase();
        url.starts_with("http") && !self.search_engine_domains.iter().any(|d| url.contains(d.as_str()))
    }
}
