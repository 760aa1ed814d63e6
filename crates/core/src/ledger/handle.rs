use tokio::sync::mpsc;

use super::LedgerEntry;

/// Handle for reporting failures.
///
/// Cheap to clone; every clone feeds the same [`LedgerWriter`](super::LedgerWriter).
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<LedgerEntry>,
}

impl LedgerHandle {
    pub fn new(tx: mpsc::Sender<LedgerEntry>) -> Self {
        Self { tx }
    }

    /// Queue an entry. A closed channel is logged, never returned.
    pub async fn record(&self, entry: LedgerEntry) {
        if let Err(e) = self.tx.send(entry).await {
            tracing::error!("Failed to queue ledger entry: {}", e);
        }
    }
}

impl std::fmt::Debug for LedgerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ErrorRecord, Issue};

    fn entry(severity_log: bool) -> LedgerEntry {
        LedgerEntry {
            record: row(),
            severity_log,
        }
    }

    fn row() -> ErrorRecord {
        ErrorRecord {
            issue: Issue::Error,
            suburb: "Manly".to_string(),
            service: "service".to_string(),
            record_type: "organic".to_string(),
            rank: "9".to_string(),
            rank_group: "4".to_string(),
            url: "https://a.com".to_string(),
            error_type: "Empty Result".to_string(),
            status: "Empty Result".to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_keeps_sink_flag() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = LedgerHandle::new(tx);

        handle.record(entry(false)).await;
        handle.clone().record(entry(true)).await;

        assert!(!rx.recv().await.unwrap().severity_log);
        assert!(rx.recv().await.unwrap().severity_log);
    }

    #[tokio::test]
    async fn test_record_on_closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        LedgerHandle::new(tx).record(entry(false)).await;
    }
}
