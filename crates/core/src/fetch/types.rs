use std::collections::HashMap;
use std::ops::AddAssign;

use crate::ledger::Issue;
use crate::record::NormalizedRecord;
use crate::submit::SubmittedTask;

/// Structured metadata for a submitted task, keyed by tag in a [`FetchJob`].
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub record: NormalizedRecord,
    /// Issue label to file failures under instead of the computed one.
    pub issue_override: Option<Issue>,
}

/// Tasks to collect, plus what is known about each.
///
/// Tasks without a context fall back to decoding their tag.
#[derive(Debug, Clone, Default)]
pub struct FetchJob {
    pub tasks: Vec<SubmittedTask>,
    pub contexts: HashMap<String, TaskContext>,
}

impl FetchJob {
    pub fn new(tasks: Vec<SubmittedTask>) -> Self {
        Self {
            tasks,
            contexts: HashMap::new(),
        }
    }

    pub fn with_context(mut self, tag: impl Into<String>, context: TaskContext) -> Self {
        self.contexts.insert(tag.into(), context);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub requested: usize,
    pub saved: usize,
    pub failed: usize,
    /// Failures filed as pending (unfinished, timed out, or interrupted).
    pub pending: usize,
    /// Results that could not be tied to a tag or record.
    pub unaccounted: usize,
    pub write_errors: usize,
}

impl AddAssign for FetchSummary {
    fn add_assign(&mut self, other: Self) {
        self.requested += other.requested;
        self.saved += other.saved;
        self.failed += other.failed;
        self.pending += other.pending;
        self.unaccounted += other.unaccounted;
        self.write_errors += other.write_errors;
    }
}
