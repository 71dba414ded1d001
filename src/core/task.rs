//! Task records owned by the router.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::protocol::{ExecutionReport, TaskRequest};

/// Lifecycle of a submitted task. Transitions only move forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Submitted,
    Planned,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            TaskStatus::Submitted => 0,
            TaskStatus::Planned => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::Completed | TaskStatus::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Submitted => "submitted",
            TaskStatus::Planned => "planned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a task identifier of the form `task_<n>_<unix-seconds>`.
pub fn task_id(counter: u64, unix_seconds: i64) -> String {
    format!("task_{}_{}", counter, unix_seconds)
}

/// A submitted task and what is known about its progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub description: String,
    pub submitted_at: f64,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ExecutionReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn new(id: impl Into<String>, description: impl Into<String>, submitted_at: f64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            submitted_at,
            status: TaskStatus::Submitted,
            progress: 0.0,
            plan: None,
            report: None,
            error: None,
        }
    }

    /// Move to `next` if it is further along. Returns whether the status
    /// changed.
    pub fn advance(&mut self, next: TaskStatus) -> bool {
        if next.rank() > self.status.rank() {
            self.status = next;
            true
        } else {
            false
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if self.advance(TaskStatus::Failed) {
            self.error = Some(error.into());
        }
    }

    /// The request payload handed to the planner.
    pub fn to_request(&self) -> TaskRequest {
        TaskRequest {
            id: self.id.clone(),
            description: self.description.clone(),
            submitted_at: self.submitted_at,
            status: self.status,
            extra: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_format() {
        assert_eq!(task_id(3, 1_700_000_000), "task_3_1700000000");
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut record = TaskRecord::new("task_1_1", "do it", 1.0);
        assert_eq!(record.status, TaskStatus::Submitted);

        assert!(record.advance(TaskStatus::InProgress));
        assert!(!record.advance(TaskStatus::Planned));
        assert_eq!(record.status, TaskStatus::InProgress);

        assert!(record.advance(TaskStatus::Completed));
        assert!(!record.advance(TaskStatus::Failed));
        assert_eq!(record.status, TaskStatus::Completed);
        assert!(record.status.is_terminal());
    }

    #[test]
    fn test_fail_records_error_once() {
        let mut record = TaskRecord::new("task_1_1", "do it", 1.0);
        record.fail("planner crashed");
        record.fail("second failure");

        assert_eq!(record.status, TaskStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("planner crashed"));
    }

    #[test]
    fn test_status_serializes_as_string() {
        let record = TaskRecord::new("task_1_1", "do it", 1.0);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "submitted");
        assert!(value.get("plan").is_none());
    }
}
