//! End-to-end lifecycle tests against the mock crawling API.
//!
//! These cover:
//! - Batch chunking, persistence, and failure isolation
//! - Resume from a saved progress cursor
//! - Tag round-trip through submission and fetch
//! - Result classification and severity
//! - Metadata-only records
//! - Polling and timeout handling
//! - Retry window filtering

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use harvest_core::{
    api::{TaskData, TaskEnvelope},
    config::{FetchConfig, RetryConfig},
    fetch::{validate_envelope, FetchJob, FetchStrategy, ResultFetcher, TaskContext},
    ledger::{
        create_ledger_system, read_ledger, CsvLedger, ErrorRecord, FailureCategory,
        FailureReporter, Issue, Ledger,
    },
    progress::ProgressTracker,
    record::{ArtifactPath, NormalizedRecord},
    retry::{RetryPolicy, RetrySelector},
    store::ContentWriter,
    submit::BatchSubmitter,
    task::BuildOutcome,
    testing::{fixtures, MockOutcome, MockTaskApi},
    shutdown_channel, Pipeline, ShutdownSignal, TaskBuilder,
};

fn bondi_record() -> NormalizedRecord {
    NormalizedRecord::from_row(&fixtures::raw_row(
        "Organic",
        "https://Example.com.au/page",
        "Bondi Beach",
        3,
        2,
    ))
}

const BONDI_TAG: &str = "Bondi-Beach/organic/type-organic_rg2_ra3_example.md";

/// Fetcher writing to `root/store` with a CSV ledger at `root/ledger.csv`.
struct FetchHarness {
    api: Arc<MockTaskApi>,
    fetcher: ResultFetcher<MockTaskApi>,
    store: ContentWriter,
    ledger_task: tokio::task::JoinHandle<u64>,
}

impl FetchHarness {
    fn new(root: &Path, api: &MockTaskApi, strategy: FetchStrategy) -> Self {
        Self::with_signal(root, api, strategy, ShutdownSignal::never())
    }

    fn with_signal(
        root: &Path,
        api: &MockTaskApi,
        strategy: FetchStrategy,
        shutdown: ShutdownSignal,
    ) -> Self {
        let api = Arc::new(api.clone());
        let (handle, writer) = create_ledger_system(
            vec![Arc::new(CsvLedger::new(root.join("ledger.csv"))) as Arc<dyn Ledger>],
            64,
        );
        let ledger_task = tokio::spawn(writer.run());
        let store = ContentWriter::new(root.join("store"));
        let fetcher = ResultFetcher::new(
            Arc::clone(&api),
            &FetchConfig::default(),
            store.clone(),
            FailureReporter::new(handle, false),
            shutdown,
        )
        .with_strategy(strategy);
        Self {
            api,
            fetcher,
            store,
            ledger_task,
        }
    }

    /// Drop the fetcher and return the ledger rows written.
    async fn finish(self, root: &Path) -> Vec<ErrorRecord> {
        drop(self.fetcher);
        self.ledger_task.await.unwrap();
        let path = root.join("ledger.csv");
        if path.exists() {
            read_ledger(&path).unwrap()
        } else {
            Vec::new()
        }
    }
}

async fn submit_one(api: &Arc<MockTaskApi>, root: &Path, record: &NormalizedRecord) -> FetchJob {
    let task = match TaskBuilder::new(Vec::new(), vec!["google.com".to_string()])
        .build(record, harvest_core::FetchProfile::Light)
    {
        BuildOutcome::Network(task) => task,
        other => panic!("expected a network task, got {:?}", other),
    };
    let tag = task.tag.clone();
    let report = BatchSubmitter::new(Arc::clone(api), 100, root.join("queued"))
        .submit("input", vec![task])
        .await;
    FetchJob::new(report.submitted).with_context(
        tag,
        TaskContext {
            record: record.clone(),
            issue_override: None,
        },
    )
}

#[tokio::test]
async fn test_120_descriptors_make_two_isolated_submissions() {
    let dir = TempDir::new().unwrap();
    let api = MockTaskApi::new();
    let submitter = BatchSubmitter::new(Arc::new(api.clone()), 100, dir.path().join("queued"));
    let tasks = (0..120).map(|i| fixtures::task(&format!("t{}", i))).collect();

    api.fail_next_submits(1).await;
    let report = submitter.submit("input", tasks).await;

    let sizes: Vec<usize> = api.submit_calls().await.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![100, 20]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed_task_count(), 100);
    assert_eq!(report.submitted.len(), 20);
    assert_eq!(report.responses.len(), 1);
    assert!(report.responses[0].exists());
    assert!(report.responses[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("input_"));
}

#[tokio::test]
async fn test_each_successful_chunk_is_persisted_separately() {
    let dir = TempDir::new().unwrap();
    let api = MockTaskApi::new();
    let submitter = BatchSubmitter::new(Arc::new(api.clone()), 100, dir.path().join("queued"));
    let tasks = (0..120).map(|i| fixtures::task(&format!("t{}", i))).collect();

    let report = submitter.submit("input", tasks).await;

    assert_eq!(report.submitted.len(), 120);
    assert_eq!(report.responses.len(), 2);
    assert_ne!(report.responses[0], report.responses[1]);
}

#[tokio::test]
async fn test_resume_from_saved_cursor() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let config = fixtures::config(root);
    for name in ["a", "b", "c"] {
        let lines: Vec<String> = (0..10)
            .map(|i| {
                fixtures::csv_line(
                    "organic",
                    &format!("https://{}{}.com", name, i),
                    "Manly",
                    i + 1,
                    i + 1,
                )
            })
            .collect();
        fixtures::write_input_csv(&config.paths.input_dir.join(format!("{}.csv", name)), &lines);
    }
    let mut tracker = ProgressTracker::load(&config.paths.progress_file).await.unwrap();
    tracker.save("b.csv", 4).await.unwrap();

    let api = MockTaskApi::new();
    let summary = Pipeline::new(config, Arc::new(api.clone()), ShutdownSignal::never())
        .run(false)
        .await
        .unwrap();

    let submitted: Vec<String> = api.submit_calls().await.into_iter().flatten().map(|t| t.start_url).collect();
    let expected: Vec<String> = (5..10)
        .map(|i| format!("https://b{}.com", i))
        .chain((0..10).map(|i| format!("https://c{}.com", i)))
        .collect();
    assert_eq!(submitted, expected);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.rows_skipped, 5);
    assert_eq!(summary.cursor.last_file.as_deref(), Some("c.csv"));
    assert_eq!(summary.cursor.last_row_index, 9);
}

#[tokio::test]
async fn test_tag_round_trips_to_artifact_path() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let api = MockTaskApi::new();
    let harness = FetchHarness::new(root, &api, FetchStrategy::Immediate);
    let record = bondi_record();

    let job = submit_one(&harness.api, root, &record).await;
    assert_eq!(job.tasks[0].tag, BONDI_TAG);

    let summary = harness.fetcher.run(job).await;
    assert_eq!(summary.saved, 1);
    let artifact = ArtifactPath::for_record(&record);
    assert_eq!(artifact.tag(), BONDI_TAG);
    assert!(harness.store.exists(&artifact).await);

    let saved = std::fs::read_to_string(root.join("store").join(BONDI_TAG)).unwrap();
    let envelope: TaskEnvelope = serde_json::from_str(&saved).unwrap();
    assert_eq!(envelope.tag(), Some(BONDI_TAG));
    assert!(harness.finish(root).await.is_empty());
}

#[tokio::test]
async fn test_dropped_tag_falls_back_to_submission_map() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let api = MockTaskApi::new();
    api.set_echo_tags(false).await;
    let harness = FetchHarness::new(root, &api, FetchStrategy::Immediate);

    let job = submit_one(&harness.api, root, &bondi_record()).await;
    assert_eq!(job.tasks[0].tag, BONDI_TAG);
    let summary = harness.fetcher.run(job).await;

    assert_eq!(summary.saved, 1);
    assert!(root.join("store").join(BONDI_TAG).exists());
    harness.finish(root).await;
}

#[tokio::test]
async fn test_empty_result_for_rank_three_is_critical() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let api = MockTaskApi::new();
    api.set_outcome(BONDI_TAG, MockOutcome::Empty).await;
    let harness = FetchHarness::new(root, &api, FetchStrategy::Immediate);

    let job = submit_one(&harness.api, root, &bondi_record()).await;
    let summary = harness.fetcher.run(job).await;
    assert_eq!(summary.failed, 1);
    assert!(!root.join("store").join(BONDI_TAG).exists());

    let rows = harness.finish(root).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].issue, Issue::Critical);
    assert_eq!(rows[0].error_type, "Empty Result");
    assert_eq!(rows[0].suburb, "Bondi Beach");
    assert_eq!(rows[0].service, "Roofing");
}

#[tokio::test]
async fn test_fetch_failures_follow_rank_rule_and_categories() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let api = MockTaskApi::new();
    let harness = FetchHarness::new(root, &api, FetchStrategy::Immediate);

    let low = fixtures::record("https://low.com", 12, 4);
    let zero = fixtures::record("https://zero.com", 1, 1);
    api.set_outcome(ArtifactPath::for_record(&low).tag(), MockOutcome::Status(40501, "Invalid Field".into()))
        .await;
    api.set_outcome(ArtifactPath::for_record(&zero).tag(), MockOutcome::CrawlFailed)
        .await;

    let mut job = submit_one(&harness.api, root, &low).await;
    let second = submit_one(&harness.api, root, &zero).await;
    job.tasks.extend(second.tasks);
    job.contexts.extend(second.contexts);
    let summary = harness.fetcher.run(job).await;
    assert_eq!(summary.failed, 2);

    let rows = harness.finish(root).await;
    let low_row = rows.iter().find(|r| r.url == "https://low.com").unwrap();
    assert_eq!(low_row.issue, Issue::Error);
    assert_eq!(low_row.status, "API Error: Invalid Field");
    let zero_row = rows.iter().find(|r| r.url == "https://zero.com").unwrap();
    assert_eq!(zero_row.issue, Issue::Critical);
    assert_eq!(zero_row.error_type, "Crawl Failed (0 pages)");
}

#[tokio::test]
async fn test_slash_in_suburb_stays_one_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let api = MockTaskApi::new();
    let harness = FetchHarness::new(root, &api, FetchStrategy::Immediate);
    let record = NormalizedRecord::from_row(&fixtures::raw_row(
        "Organic",
        "https://example.com.au/page",
        "Abbotsford / NSW",
        3,
        2,
    ));

    let job = submit_one(&harness.api, root, &record).await;
    assert_eq!(job.tasks[0].tag, "Abbotsford---NSW/organic/type-organic_rg2_ra3_example.md");
    let summary = harness.fetcher.run(job).await;

    assert_eq!(summary.saved, 1);
    assert_eq!(summary.write_errors, 0);
    assert!(root
        .join("store/Abbotsford---NSW/organic/type-organic_rg2_ra3_example.md")
        .exists());
    assert!(harness.finish(root).await.is_empty());
}

#[tokio::test]
async fn test_unwritable_store_files_the_result() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    // A plain file where the store directory should be.
    std::fs::write(root.join("store"), b"not a directory").unwrap();
    let api = MockTaskApi::new();
    let harness = FetchHarness::new(root, &api, FetchStrategy::Immediate);

    let job = submit_one(&harness.api, root, &bondi_record()).await;
    let summary = harness.fetcher.run(job).await;
    assert_eq!(summary.saved, 0);
    assert_eq!(summary.write_errors, 1);
    assert_eq!(summary.failed, 0);

    let rows = harness.finish(root).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].error_type, "Store Failed");
    assert!(rows[0].status.starts_with("Store Failed: "));
    assert_eq!(rows[0].suburb, "Bondi Beach");
    assert_eq!(rows[0].issue, Issue::Critical);
}

#[tokio::test]
async fn test_interrupted_wait_files_every_task_pending() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let api = MockTaskApi::new();
    let (trigger, shutdown) = shutdown_channel();
    let harness = FetchHarness::with_signal(
        root,
        &api,
        FetchStrategy::Delayed(Duration::from_secs(600)),
        shutdown,
    );

    let mut job = submit_one(&harness.api, root, &bondi_record()).await;
    let second = submit_one(&harness.api, root, &fixtures::record("https://low.com", 12, 4)).await;
    job.tasks.extend(second.tasks);
    job.contexts.extend(second.contexts);

    let fetcher = harness.fetcher.clone();
    let waiting = tokio::spawn(async move { fetcher.run(job).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    trigger.trigger();
    let summary = waiting.await.unwrap();

    assert_eq!(summary.requested, 2);
    assert_eq!(summary.pending, 2);
    assert_eq!(summary.saved, 0);
    assert!(api.fetch_calls().await.is_empty());

    let rows = harness.finish(root).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.issue == Issue::Pending));
    assert!(rows.iter().all(|r| r.status == "Pending/Progress: interrupted"));
}

#[test]
fn test_status_check_precedes_emptiness() {
    let envelope = TaskEnvelope {
        id: "1".to_string(),
        status_code: 40602,
        status_message: "Task In Queue.".to_string(),
        data: TaskData::default(),
        result: Some(Vec::new()),
        extra: Default::default(),
    };
    assert_eq!(
        validate_envelope(&envelope),
        Err(FailureCategory::ApiError("Task In Queue.".to_string()))
    );
}

#[tokio::test]
async fn test_polling_waits_for_finished_crawl() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let api = MockTaskApi::new();
    api.set_pending_rounds(BONDI_TAG, 2).await;
    let harness = FetchHarness::new(
        root,
        &api,
        FetchStrategy::Poll {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        },
    );

    let job = submit_one(&harness.api, root, &bondi_record()).await;
    let summary = harness.fetcher.run(job).await;

    assert_eq!(summary.saved, 1);
    assert_eq!(api.fetch_calls().await.len(), 3);
    assert!(harness.finish(root).await.is_empty());
}

#[tokio::test]
async fn test_poll_timeout_files_pending_rows() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let api = MockTaskApi::new();
    api.set_outcome(BONDI_TAG, MockOutcome::Pending("in_progress".to_string()))
        .await;
    let harness = FetchHarness::new(
        root,
        &api,
        FetchStrategy::Poll {
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(50),
        },
    );

    let job = submit_one(&harness.api, root, &bondi_record()).await;
    let summary = harness.fetcher.run(job).await;
    assert_eq!(summary.pending, 1);

    let rows = harness.finish(root).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].issue, Issue::Pending);
    assert_eq!(rows[0].status, "Pending/Progress: in_progress");
}

#[tokio::test]
async fn test_unanswered_task_is_never_silently_dropped() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let api = MockTaskApi::new();
    api.drop_tag(BONDI_TAG).await;
    let harness = FetchHarness::new(root, &api, FetchStrategy::Immediate);

    // Without structured metadata the record is decoded from the tag.
    let mut job = submit_one(&harness.api, root, &bondi_record()).await;
    job.contexts.clear();
    let summary = harness.fetcher.run(job).await;
    assert_eq!(summary.failed, 1);

    let rows = harness.finish(root).await;
    assert_eq!(rows[0].error_type, "Unknown Error");
    assert_eq!(rows[0].suburb, "Bondi-Beach");
    assert_eq!(rows[0].rank, "3");
    assert_eq!(rows[0].issue, Issue::Critical);
}

#[tokio::test]
async fn test_empty_url_produces_stub_and_no_network_task() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let config = fixtures::config(root);
    fixtures::write_input_csv(
        &config.paths.input_dir.join("a.csv"),
        &[
            fixtures::csv_line("organic", "", "Manly", 2, 2),
            fixtures::csv_line("organic", "https://www.google.com/maps?q=x", "Manly", 3, 3),
        ],
    );
    let store = config.paths.store_root.clone();
    let api = MockTaskApi::new();

    let summary = Pipeline::new(config, Arc::new(api.clone()), ShutdownSignal::never())
        .run(false)
        .await
        .unwrap();

    assert_eq!(summary.stubs, 2);
    assert!(api.submit_calls().await.is_empty());
    let stub = std::fs::read_to_string(store.join("Manly/organic/type-organic_rg2_ra2_metadata.md")).unwrap();
    assert!(stub.contains("### Raw Row Data:"));
    assert!(stub.contains("\"suburb\": \"Manly\""));
    assert!(store.join("Manly/organic/type-organic_rg3_ra3_google.md").exists());
}

#[test]
fn test_rank_group_six_is_never_selected() {
    let selector = RetrySelector::new(RetryPolicy::new(
        &RetryConfig::default(),
        &["google.com".to_string()],
    ));
    let rows: Vec<ErrorRecord> = [Issue::Critical, Issue::Error, Issue::Pending]
        .into_iter()
        .map(|issue| ErrorRecord {
            issue,
            suburb: "Manly".to_string(),
            service: "Roofing".to_string(),
            record_type: "organic".to_string(),
            rank: "1".to_string(),
            rank_group: "6".to_string(),
            url: "https://a.com".to_string(),
            error_type: "Pending/Progress".to_string(),
            status: "Pending/Progress: in_progress".to_string(),
        })
        .collect();

    assert!(selector.select(&rows).is_empty());
}
