use std::collections::HashSet;

use tracing::warn;

use crate::task::TaskDescriptor;

/// Pending descriptors awaiting submission. Tags are unique within a buffer.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    tasks: Vec<TaskDescriptor>,
    tags: HashSet<String>,
    flush_threshold: usize,
}

impl BatchBuffer {
    pub fn new(flush_threshold: usize) -> Self {
        Self {
            tasks: Vec::new(),
            tags: HashSet::new(),
            flush_threshold: flush_threshold.max(1),
        }
    }

    /// Add a descriptor. Returns false if its tag is already buffered.
    pub fn push(&mut self, task: TaskDescriptor) -> bool {
        if !self.tags.insert(task.tag.clone()) {
            warn!(tag = %task.tag, "Duplicate tag in batch, skipping");
            return false;
        }
        self.tasks.push(task);
        true
    }

    pub fn should_flush(&self) -> bool {
        self.tasks.len() >= self.flush_threshold
    }

    /// Drain the buffer.
    pub fn take(&mut self) -> Vec<TaskDescriptor> {
        self.tags.clear();
        std::mem::take(&mut self.tasks)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
