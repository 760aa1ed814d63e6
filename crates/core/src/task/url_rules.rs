//! Per-domain URL clean-up rules.

use serde::{Deserialize, Serialize};

/// Strip `strip_suffix` from URLs whose text contains `domain_contains`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRule {
    pub domain_contains: String,
    pub strip_suffix: String,
}

impl UrlRule {
    pub fn applies_to(&self, url: &str) -> bool {
        !self.domain_contains.is_empty()
            && url
                .to_ascii_lowercase()
                .contains(&self.domain_contains.to_ascii_lowercase())
    }

    pub fn apply<'a>(&self, url: &'a str) -> &'a str {
        if self.applies_to(url) {
            url.strip_suffix(self.strip_suffix.as_str()).unwrap_or(url)
        } else {
            url
        }
    }
}

/// Trim the URL and apply the first matching rule.
pub fn normalize_url(rules: &[UrlRule], url: &str) -> String {
    let trimmed = url.trim();
    rules
        .iter()
        .find(|rule| rule.applies_to(trimmed))
        .map(|rule| rule.apply(trimmed))
        .unwrap_or(trimmed)
        .to_string()
}
