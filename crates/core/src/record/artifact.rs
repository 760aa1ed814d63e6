//! Artifact path encoding and the filename fallback decoder.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::NormalizedRecord;

/// Domain slug used for records without a URL.
pub const METADATA_DOMAIN: &str = "metadata";

static SCHEME_OR_WWW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(https?://|www\.)").expect("valid regex"));

static ARTIFACT_FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^type-(.+)_rg([^_]*)_ra([^_]*)_(.*)\.md$").expect("valid regex")
});

/// Relative location of one record's artifact: `{suburb}/{type}/{file}`.
///
/// The string form is used verbatim as the task tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactPath {
    suburb_slug: String,
    type_slug: String,
    file_name: String,
}

/// Metadata recovered from an artifact file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFileName {
    pub record_type: String,
    pub rank_group: String,
    pub rank_absolute: String,
    pub domain: String,
}

impl ArtifactPath {
    /// Path for a normalized record.
    pub fn for_record(record: &NormalizedRecord) -> Self {
        let file_name = format!(
            "type-{}_rg{}_ra{}_{}.md",
            without_separators(&record.record_type),
            without_separators(&record.rank_group),
            without_separators(&record.rank_absolute),
            without_separators(&domain_slug(&record.url))
        );
        Self {
            suburb_slug: slugify(&record.suburb),
            type_slug: slugify(&record.record_type),
            file_name,
        }
    }

    /// Parse a tag back into its three segments.
    ///
    /// Rejects absolute paths and parent-directory components so a tag echoed
    /// by the API can never escape the store root.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        let path = Path::new(tag);
        if !path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        let parts: Vec<&str> = tag.split('/').filter(|p| !p.is_empty()).collect();
        match parts.as_slice() {
            [suburb, item_type, file] => Some(Self {
                suburb_slug: suburb.to_string(),
                type_slug: item_type.to_string(),
                file_name: file.to_string(),
            }),
            _ => None,
        }
    }

    pub fn suburb_slug(&self) -> &str {
        &self.suburb_slug
    }

    pub fn type_slug(&self) -> &str {
        &self.type_slug
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Directory holding the artifact, relative to a store root.
    pub fn dir(&self) -> PathBuf {
        PathBuf::from(&self.suburb_slug).join(&self.type_slug)
    }

    /// Artifact path relative to a store root.
    pub fn relative_path(&self) -> PathBuf {
        self.dir().join(&self.file_name)
    }

    /// Correlation tag sent to the API.
    pub fn tag(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.suburb_slug, self.type_slug, self.file_name)
    }
}

/// `"Bondi Beach"` -> `"Bondi-Beach"`.
///
/// The result is always one normal path segment: separators become `-` and
/// an empty, `.` or `..` slug becomes `_`.
pub fn slugify(text: &str) -> String {
    let slug = without_separators(text.trim()).replace(' ', "-");
    match slug.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => slug,
    }
}

fn without_separators(text: &str) -> String {
    text.replace(['/', '\\'], "-")
}

/// Host part of a URL with scheme and `www.` removed.
pub fn bare_host(url: &str) -> String {
    let stripped = SCHEME_OR_WWW.replace_all(url.trim(), "");
    stripped
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// First label of the URL's host, lowercased. Empty URLs map to `metadata`.
pub fn domain_slug(url: &str) -> String {
    if url.trim().is_empty() {
        return METADATA_DOMAIN.to_string();
    }
    bare_host(url)
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Decode `type-{type}_rg{rg}_ra{ra}_{domain}.md`.
pub fn decode_file_name(file_name: &str) -> Option<DecodedFileName> {
    let caps = ARTIFACT_FILE_NAME.captures(file_name)?;
    Some(DecodedFileName {
        record_type: caps[1].to_string(),
        rank_group: caps[2].to_string(),
        rank_absolute: caps[3].to_string(),
        domain: caps[4].to_string(),
    })
}

/// Rebuild a record from a tag when no structured metadata is available.
///
/// This is a degraded mode: the service is unknown and the suburb is the
/// slug, not the original spelling.
pub fn decode_tag(tag: &str, url: &str) -> Option<NormalizedRecord> {
    let file_name = tag.rsplit('/').next()?;
    let decoded = decode_file_name(file_name)?;
    let segments: Vec<&str> = tag.split('/').collect();
    let suburb = if segments.len() > 1 {
        segments[0].to_string()
    } else {
        "Unknown".to_string()
    };

    Some(NormalizedRecord {
        record_type: decoded.record_type,
        url: url.to_string(),
        suburb,
        service: "service".to_string(),
        rank_absolute: decoded.rank_absolute,
        rank_group: decoded.rank_group,
        domain: decoded.domain,
    })
}
