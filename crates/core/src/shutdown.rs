//! Cooperative cancellation.
//!
//! The binary holds the [`ShutdownTrigger`] and fires it on Ctrl+C or SIGTERM.
//! Long waits in the pipeline go through [`ShutdownSignal::sleep`] so an
//! interrupt ends them early.

use std::time::Duration;

use tokio::sync::watch;

/// Fires the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes the shutdown signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

impl ShutdownSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, signal) = shutdown_channel();
        signal
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|fired| *fired).await.is_err() {
            // Trigger dropped without firing.
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `duration`. Returns false if interrupted.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_triggered() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.triggered() => false,
        }
    }
}
