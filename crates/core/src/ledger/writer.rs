use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::{CsvLedger, Ledger, LedgerEntry, LedgerHandle, SeverityLog};
use crate::config::LedgerConfig;

/// Background task that receives ledger entries and appends them to every sink.
pub struct LedgerWriter {
    rx: mpsc::Receiver<LedgerEntry>,
    sinks: Vec<Arc<dyn Ledger>>,
}

impl LedgerWriter {
    pub fn new(rx: mpsc::Receiver<LedgerEntry>, sinks: Vec<Arc<dyn Ledger>>) -> Self {
        Self { rx, sinks }
    }

    /// Consume entries until every handle is dropped.
    ///
    /// Returns the number of entries received. Sinks do blocking file I/O, so
    /// each entry is appended on the blocking pool; entries still land in
    /// arrival order. A failing sink is logged and the remaining sinks still
    /// receive the entry.
    pub async fn run(mut self) -> u64 {
        tracing::debug!(sinks = self.sinks.len(), "Ledger writer started");
        let mut received = 0u64;

        while let Some(entry) = self.rx.recv().await {
            received += 1;
            let sinks = self.sinks.clone();
            let appended = tokio::task::spawn_blocking(move || append_to_all(&sinks, &entry)).await;
            if let Err(e) = appended {
                tracing::error!("Ledger append task failed: {}", e);
            }
        }

        tracing::debug!(received, "Ledger writer shutting down");
        received
    }
}

fn append_to_all(sinks: &[Arc<dyn Ledger>], entry: &LedgerEntry) {
    for sink in sinks {
        if let Err(e) = sink.append(entry) {
            tracing::error!(sink = sink.name(), "Failed to write ledger entry: {}", e);
        }
    }
}

/// Create a ledger handle and the writer that serves it.
///
/// Spawn the writer with `tokio::spawn(writer.run())`, drop every handle, then
/// await the join handle to flush.
pub fn create_ledger_system(
    sinks: Vec<Arc<dyn Ledger>>,
    buffer_size: usize,
) -> (LedgerHandle, LedgerWriter) {
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    (LedgerHandle::new(tx), LedgerWriter::new(rx, sinks))
}

/// Sinks enabled by configuration for a ledger file and its store root.
pub fn configured_sinks(
    config: &LedgerConfig,
    ledger_path: &Path,
    store_root: &Path,
) -> Vec<Arc<dyn Ledger>> {
    let mut sinks: Vec<Arc<dyn Ledger>> = Vec::new();
    if config.csv_enabled {
        sinks.push(Arc::new(CsvLedger::new(ledger_path)));
    }
    if config.severity_log_enabled {
        sinks.push(Arc::new(SeverityLog::new(store_root)));
    }
    sinks
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};

    use super::*;
    use crate::ledger::{ErrorRecord, Issue, LedgerError};

    struct MemorySink {
        entries: Mutex<Vec<LedgerEntry>>,
        threads: Mutex<Vec<ThreadId>>,
        should_fail: bool,
    }

    impl MemorySink {
        fn new(should_fail: bool) -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
                threads: Mutex::new(Vec::new()),
                should_fail,
            }
        }

        fn count(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        fn urls(&self) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.record.url.clone())
                .collect()
        }
    }

    impl Ledger for MemorySink {
        fn name(&self) -> &str {
            "memory"
        }

        fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
            self.threads.lock().unwrap().push(thread::current().id());
            if self.should_fail {
                return Err(LedgerError::Io {
                    path: "memory".to_string(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn entry(url: &str, severity_log: bool) -> LedgerEntry {
        LedgerEntry {
            record: row(url),
            severity_log,
        }
    }

    fn row(url: &str) -> ErrorRecord {
        ErrorRecord {
            issue: Issue::Critical,
            suburb: "Manly".to_string(),
            service: "service".to_string(),
            record_type: "organic".to_string(),
            rank: "1".to_string(),
            rank_group: "1".to_string(),
            url: url.to_string(),
            error_type: "Empty Result".to_string(),
            status: "Empty Result".to_string(),
        }
    }

    #[tokio::test]
    async fn test_writer_drains_all_handles() {
        let sink = Arc::new(MemorySink::new(false));
        let (handle, writer) = create_ledger_system(vec![sink.clone() as Arc<dyn Ledger>], 2);
        let task = tokio::spawn(writer.run());

        let mut senders = Vec::new();
        for i in 0..10 {
            let handle = handle.clone();
            senders.push(tokio::spawn(async move {
                handle.record(entry(&format!("https://{}.com", i), false)).await;
            }));
        }
        for s in senders {
            s.await.unwrap();
        }
        drop(handle);

        assert_eq!(task.await.unwrap(), 10);
        assert_eq!(sink.count(), 10);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let broken = Arc::new(MemorySink::new(true));
        let healthy = Arc::new(MemorySink::new(false));
        let (handle, writer) = create_ledger_system(
            vec![
                broken.clone() as Arc<dyn Ledger>,
                healthy.clone() as Arc<dyn Ledger>,
            ],
            4,
        );
        let task = tokio::spawn(writer.run());

        handle.record(entry("https://a.com", true)).await;
        drop(handle);
        task.await.unwrap();

        assert_eq!(broken.count(), 0);
        assert_eq!(healthy.count(), 1);
    }

    #[tokio::test]
    async fn test_appends_run_off_the_runtime_thread_in_order() {
        let sink = Arc::new(MemorySink::new(false));
        let (handle, writer) = create_ledger_system(vec![sink.clone() as Arc<dyn Ledger>], 8);
        let task = tokio::spawn(writer.run());

        for i in 0..5 {
            handle.record(entry(&format!("https://{}.com", i), false)).await;
        }
        drop(handle);
        task.await.unwrap();

        let expected: Vec<String> = (0..5).map(|i| format!("https://{}.com", i)).collect();
        assert_eq!(sink.urls(), expected);
        // The test runtime is single-threaded, so its thread never appends.
        let runtime_thread = thread::current().id();
        assert!(sink.threads.lock().unwrap().iter().all(|id| *id != runtime_thread));
    }

    #[test]
    fn test_configured_sinks_respect_toggles() {
        let mut config = LedgerConfig::default();
        let root = Path::new("store");
        let ledger = root.join("_error_summary.csv");
        assert_eq!(configured_sinks(&config, &ledger, root).len(), 2);

        config.severity_log_enabled = false;
        let sinks = configured_sinks(&config, &ledger, root);
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].name(), "csv");

        config.csv_enabled = false;
        assert!(configured_sinks(&config, &ledger, root).is_empty());
    }
}
