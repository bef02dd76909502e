//! Per-task runtime state for the parallel analysis stage.
//!
//! Each concurrent analysis task owns exactly one [`AgentTaskState`] slot in
//! the run aggregate. The slot is mutated only through the coordinator's
//! mailbox, so there is never more than one writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::analysis_models::Reference;

/// Lifecycle status of a single analysis task.
///
/// Normal progression: Pending -> Running -> Completed.
/// A task whose collaborator errored or timed out ends as Failed; siblings
/// are unaffected.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task has been registered but not dispatched yet.
    Pending,

    /// Task is actively executing.
    Running,

    /// Task finished with a successful result.
    Completed,

    /// Task finished with a captured error.
    Failed,
}

impl TaskStatus {
    /// Whether the task has reached a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Terminal outcome of one analysis task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct TaskResult {
    pub success: bool,

    /// Collaborator payload when the task succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "any | null")]
    pub data: Option<Value>,

    /// Captured failure reason when the task failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// One auxiliary web lookup performed by a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct SearchRecord {
    /// The queries that were issued.
    pub queries: Vec<String>,

    /// The references the lookup returned.
    pub references: Vec<Reference>,
}

/// Runtime state of one concurrent analysis task.
///
/// Created when the task is dispatched; immutable once `status` is terminal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct AgentTaskState {
    /// Task identity, e.g. "news", "technical", "fundamental".
    pub name: String,

    pub status: TaskStatus,

    /// Completion percentage, 0-100. Never decreases while Running.
    pub progress: u8,

    /// Append-only human-readable progress messages.
    pub messages: Vec<String>,

    /// Label of the step currently executing, if the task reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Last intermediate-data snapshot the task reported (last value wins).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "any | null")]
    pub intermediate: Option<Value>,

    /// Auxiliary lookups the task performed, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub searches: Vec<SearchRecord>,

    /// Terminal result, present once status is Completed or Failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

impl AgentTaskState {
    /// Create a Pending slot for a named task.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TaskStatus::Pending,
            progress: 0,
            messages: Vec::new(),
            current_step: None,
            started_at: None,
            completed_at: None,
            intermediate: None,
            searches: Vec::new(),
            result: None,
        }
    }

    /// Mark the task dispatched.
    pub fn start(&mut self, at: DateTime<Utc>) {
        self.status = TaskStatus::Running;
        self.started_at = Some(at);
    }

    /// Apply one progress update.
    ///
    /// Percentage is clamped to [0, 100] and never regresses while the task
    /// is running. The intermediate snapshot is replaced wholesale.
    pub fn record_progress(
        &mut self,
        step: Option<String>,
        message: String,
        percent: u8,
        snapshot: Option<Value>,
    ) {
        if self.status.is_terminal() {
            return;
        }
        self.progress = self.progress.max(percent.min(100));
        self.messages.push(message);
        if step.is_some() {
            self.current_step = step;
        }
        if snapshot.is_some() {
            self.intermediate = snapshot;
        }
    }

    /// Record one auxiliary lookup.
    pub fn record_search(&mut self, record: SearchRecord) {
        if self.status.is_terminal() {
            return;
        }
        self.searches.push(record);
    }

    /// Apply the terminal result and freeze the slot.
    pub fn finish(&mut self, result: TaskResult, at: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = if result.success {
            self.progress = 100;
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        self.completed_at = Some(at);
        self.result = Some(result);
    }

    /// Wall-clock duration of the task, once both timestamps are known.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
