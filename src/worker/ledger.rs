//! Per-task bookkeeping shared by all workers

use dashmap::DashMap;

use crate::models::{TaskId, TaskState};

#[derive(Debug, Clone, Copy)]
struct TaskRecord {
    state: TaskState,
    attempts: u32,
    failures: u32,
}

/// What to do with a task after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { failures: u32 },
    GiveUp { failures: u32 },
}

/// Task states plus attempt and retry counters, keyed by task id.
///
/// Entries are updated through `DashMap::entry`, so concurrent workers never
/// lose an increment.
#[derive(Debug, Default)]
pub struct TaskLedger {
    records: DashMap<TaskId, TaskRecord>,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_pending(&self, id: &TaskId) {
        self.records
            .entry(id.clone())
            .and_modify(|r| r.state = TaskState::Pending)
            .or_insert(TaskRecord {
                state: TaskState::Pending,
                attempts: 0,
                failures: 0,
            });
    }

    /// Record the start of an attempt and return its number (1-based)
    pub fn begin_attempt(&self, id: &TaskId) -> u32 {
        let mut record = self.records.entry(id.clone()).or_insert(TaskRecord {
            state: TaskState::Pending,
            attempts: 0,
            failures: 0,
        });
        record.state = TaskState::Running;
        record.attempts += 1;
        record.attempts
    }

    pub fn mark_succeeded(&self, id: &TaskId) {
        self.set_state(id, TaskState::Succeeded);
    }

    pub fn mark_cancelled(&self, id: &TaskId) {
        self.set_state(id, TaskState::Cancelled);
    }

    /// Count a failure and decide between another attempt and giving up.
    ///
    /// A task is retried while its failure count stays within `max_retries`.
    pub fn record_failure(&self, id: &TaskId, max_retries: u32, retryable: bool) -> RetryDecision {
        let mut record = self.records.entry(id.clone()).or_insert(TaskRecord {
            state: TaskState::Running,
            attempts: 1,
            failures: 0,
        });
        record.failures += 1;

        if retryable && record.failures <= max_retries {
            record.state = TaskState::Retrying;
            RetryDecision::Retry {
                failures: record.failures,
            }
        } else {
            record.state = TaskState::PermanentlyFailed;
            RetryDecision::GiveUp {
                failures: record.failures,
            }
        }
    }

    pub fn state(&self, id: &TaskId) -> Option<TaskState> {
        self.records.get(id).map(|r| r.state)
    }

    pub fn attempts(&self, id: &TaskId) -> u32 {
        self.records.get(id).map(|r| r.attempts).unwrap_or(0)
    }

    pub fn failures(&self, id: &TaskId) -> u32 {
        self.records.get(id).map(|r| r.failures).unwrap_or(0)
    }

    fn set_state(&self, id: &TaskId, state: TaskState) {
        if let Some(mut record) = self.records.get_mut(id) {
            record.state = state;
        }
    }
}
