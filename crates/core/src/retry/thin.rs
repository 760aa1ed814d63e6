//! Scan a content store for undersized artifacts.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{CandidateSource, RetryCandidate, RetryError};
use crate::config::ThinContentConfig;
use crate::ledger::Issue;
use crate::record::{decode_file_name, decode_tag, ArtifactPath};
use crate::store::{walk_files, STUB_ROW_MARKER};
use crate::task::{normalize_url, UrlRule};

pub const STATUS_SKIPPED: &str = "Skipped";
pub const STATUS_PENDING: &str = "Pending";

/// Verdict for one thin artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThinVerdict {
    /// Link-directory page; thin by nature.
    Directory,
    /// Ranked below the re-queue window.
    LowRank(u32),
    /// Re-queued.
    TopRanked,
}

/// One row of the scan report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThinReportRow {
    #[serde(rename = "Issue")]
    pub issue: String,
    pub suburb: String,
    pub rank_group: u32,
    pub url: String,
    pub actual_size: String,
    pub status: String,
    pub file_path: String,
}

/// A thin artifact with everything needed to report or re-queue it.
#[derive(Debug, Clone)]
pub struct ThinArtifact {
    pub path: PathBuf,
    pub artifact: ArtifactPath,
    pub size_bytes: u64,
    pub url: String,
    pub rank_group: u32,
    pub suburb: String,
    pub verdict: ThinVerdict,
}

impl ThinArtifact {
    pub fn report_row(&self, top_n: usize) -> ThinReportRow {
        let (issue, status) = match &self.verdict {
            ThinVerdict::Directory => ("Error (Directory)".to_string(), STATUS_SKIPPED),
            ThinVerdict::LowRank(rg) => (format!("Error (Low Rank: {})", rg), STATUS_SKIPPED),
            ThinVerdict::TopRanked => (format!("CRITICAL (Top {})", top_n), STATUS_PENDING),
        };
        ThinReportRow {
            issue,
            suburb: self.suburb.clone(),
            rank_group: self.rank_group,
            url: self.url.clone(),
            actual_size: format!("{:.2} KB", self.size_bytes as f64 / 1024.0),
            status: status.to_string(),
            file_path: self.path.display().to_string(),
        }
    }
}

/// Result of a scan.
#[derive(Debug, Clone, Default)]
pub struct ThinScan {
    pub scanned: usize,
    pub artifacts: Vec<ThinArtifact>,
}

impl ThinScan {
    /// Re-queue candidates, best rank group first, at most `top_n`.
    pub fn candidates(&self, top_n: usize) -> Vec<RetryCandidate> {
        let mut queued: Vec<&ThinArtifact> = self
            .artifacts
            .iter()
            .filter(|a| a.verdict == ThinVerdict::TopRanked)
            .collect();
        queued.sort_by_key(|a| a.rank_group);

        queued
            .into_iter()
            .take(top_n)
            .filter_map(|a| {
                let record = decode_tag(&a.artifact.tag(), &a.url)?;
                Some(RetryCandidate {
                    record,
                    artifact: a.artifact.clone(),
                    original_issue: Issue::Critical,
                    source: CandidateSource::ThinContent,
                })
            })
            .collect()
    }
}

/// Finds artifacts below the configured size in one store.
#[derive(Debug, Clone)]
pub struct ThinContentScanner {
    config: ThinContentConfig,
    url_rules: Vec<UrlRule>,
}

impl ThinContentScanner {
    pub fn new(config: ThinContentConfig, url_rules: Vec<UrlRule>) -> Self {
        Self { config, url_rules }
    }

    pub fn top_n(&self) -> usize {
        self.config.top_n
    }

    pub async fn scan(&self, store_root: &Path) -> Result<ThinScan, RetryError> {
        let mut scan = ThinScan::default();
        let type_filter = self.config.type_contains.to_lowercase();

        for path in walk_files(store_root).await? {
            let Some(artifact) = relative_artifact(store_root, &path) else {
                continue;
            };
            if !artifact.file_name().ends_with(".md")
                || artifact.file_name().starts_with('_')
                || !artifact.type_slug().to_lowercase().contains(&type_filter)
            {
                continue;
            }
            scan.scanned += 1;

            let size_bytes = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    warn!(path = %path.display(), "Cannot stat artifact: {}", e);
                    continue;
                }
            };
            if size_bytes >= self.config.min_size_bytes {
                continue;
            }

            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    warn!(path = %path.display(), "Cannot read artifact: {}", e);
                    continue;
                }
            };
            let Some(url) = extract_url(&contents) else {
                debug!(path = %path.display(), "Thin artifact has no crawlable URL");
                continue;
            };
            let url = normalize_url(&self.url_rules, &url);

            let rank_group = decode_file_name(artifact.file_name())
                .and_then(|d| d.rank_group.trim().parse::<u32>().ok())
                .unwrap_or(0);
            let verdict = self.verdict(&url, rank_group);
            let suburb = path
                .parent()
                .and_then(Path::parent)
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            scan.artifacts.push(ThinArtifact {
                path,
                artifact,
                size_bytes,
                url,
                rank_group,
                suburb,
                verdict,
            });
        }

        info!(
            store = %store_root.display(),
            scanned = scan.scanned,
            thin = scan.artifacts.len(),
            "Thin-content scan complete"
        );
        Ok(scan)
    }

    fn verdict(&self, url: &str, rank_group: u32) -> ThinVerdict {
        let lower = url.to_lowercase();
        if self
            .config
            .excluded_domains
            .iter()
            .any(|d| lower.contains(&d.to_lowercase()))
        {
            ThinVerdict::Directory
        } else if rank_group as usize > self.config.top_n {
            ThinVerdict::LowRank(rank_group)
        } else {
            ThinVerdict::TopRanked
        }
    }

    /// Write the scan report as CSV under `store_root`.
    pub fn write_report(&self, store_root: &Path, scan: &ThinScan) -> Result<PathBuf, RetryError> {
        let path = store_root.join(&self.config.report_file);
        let report_err = |source| RetryError::Report {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| report_err(e.into()))?;
        }
        let mut writer = csv::Writer::from_path(&path).map_err(report_err)?;
        for artifact in &scan.artifacts {
            writer
                .serialize(artifact.report_row(self.config.top_n))
                .map_err(report_err)?;
        }
        writer.flush().map_err(|e| report_err(e.into()))?;
        Ok(path)
    }
}

fn relative_artifact(root: &Path, path: &Path) -> Option<ArtifactPath> {
    let relative = path.strip_prefix(root).ok()?;
    let tag = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    ArtifactPath::parse_tag(&tag)
}

/// URL recorded in an artifact: a saved envelope's `data.start_url`, or the
/// `url` column of a stub's raw row. Only http(s) URLs qualify.
pub fn extract_url(contents: &str) -> Option<String> {
    let url = match serde_json::from_str::<Value>(contents) {
        Ok(envelope) => {
            let data = envelope.get("data")?;
            data.get("start_url")
                .or_else(|| data.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string)
        }
        Err(_) => {
            let (_, raw) = contents.split_once(STUB_ROW_MARKER)?;
            let row: Value = serde_json::from_str(raw.trim()).ok()?;
            row.get("url").and_then(Value::as_str).map(str::to_string)
        }
    }?;
    let url = url.trim().to_string();
    url.to_lowercase().starts_with("http").then_some(url)
}
