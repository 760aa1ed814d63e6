//! Testing utilities and mock implementations.
//!
//! [`MockTaskApi`] stands in for the crawling service, so the whole pipeline
//! can be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_core::testing::{MockOutcome, MockTaskApi};
//!
//! let api = MockTaskApi::new();
//! api.set_outcome("Manly/organic/type-organic_rg1_ra1_acme.md", MockOutcome::Empty).await;
//! api.drop_tag("Manly/organic/type-organic_rg2_ra2_beta.md").await;
//!
//! // Run the pipeline against Arc::new(api.clone()) ...
//! assert_eq!(api.submit_calls().await.len(), 1);
//! ```

mod mock_task_api;

pub use mock_task_api::{MockOutcome, MockTaskApi};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::config::{load_config_from_str, Config};
    use crate::record::{NormalizedRecord, RawRow};
    use crate::task::{FetchProfile, TaskDescriptor};

    /// Header shared by the fixture CSV files.
    pub const CSV_HEADER: &str = "type,rank_group,rank_absolute,domain,title,url,suburb,service";

    /// A light-profile task for `https://{tag}.com`.
    pub fn task(tag: &str) -> TaskDescriptor {
        let url = format!("https://{}.com", tag);
        TaskDescriptor {
            target: format!("{}.com", tag),
            start_url: url.clone(),
            url,
            enable_content_parsing: true,
            max_crawl_pages: 1,
            fetch_profile: FetchProfile::Light,
            params: FetchProfile::Light.crawl_params(),
            tag: tag.to_string(),
        }
    }

    /// An organic record in Manly.
    pub fn record(url: &str, rank_absolute: u32, rank_group: u32) -> NormalizedRecord {
        NormalizedRecord {
            record_type: "organic".to_string(),
            url: url.to_string(),
            suburb: "Manly".to_string(),
            service: "Roofing".to_string(),
            rank_absolute: rank_absolute.to_string(),
            rank_group: rank_group.to_string(),
            domain: String::new(),
        }
    }

    /// A raw row in the SERP export layout.
    pub fn raw_row(record_type: &str, url: &str, suburb: &str, rank_absolute: u32, rank_group: u32) -> RawRow {
        [
            ("type", record_type.to_string()),
            ("rank_group", rank_group.to_string()),
            ("rank_absolute", rank_absolute.to_string()),
            ("domain", String::new()),
            ("title", "Result".to_string()),
            ("url", url.to_string()),
            ("suburb", suburb.to_string()),
            ("service", "Roofing".to_string()),
        ]
        .into_iter()
        .collect()
    }

    /// CSV line matching [`CSV_HEADER`].
    pub fn csv_line(record_type: &str, url: &str, suburb: &str, rank_absolute: u32, rank_group: u32) -> String {
        format!(
            "{},{},{},,Result,{},{},Roofing",
            record_type, rank_group, rank_absolute, url, suburb
        )
    }

    /// Write an input CSV with the fixture header.
    pub fn write_input_csv(path: &Path, lines: &[String]) {
        let mut body = String::from(CSV_HEADER);
        for line in lines {
            body.push('\n');
            body.push_str(line);
        }
        body.push('\n');
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create input dir");
        }
        std::fs::write(path, body).expect("write input csv");
    }

    /// Configuration with every path under `root` and no fetch delay.
    pub fn config(root: &Path) -> Config {
        let toml = format!(
            r#"
[api]
username = "user"
password = "secret"

[paths]
input_dir = "{root}/input"
queue_dir = "{root}/queued"
store_root = "{root}/store"
progress_file = "{root}/progress.json"
final_store_root = "{root}/final"

[submit]
batch_size = 100
flush_threshold = 50

[fetch]
strategy = "immediate"
max_concurrent = 4
request_chunk = 20

[retry]
store_root = "{root}/retry_store"
queue_dir = "{root}/retry_queued"
"#,
            root = root.display().to_string().replace('\\', "/")
        );
        load_config_from_str(&toml).expect("fixture config is valid")
    }
}
