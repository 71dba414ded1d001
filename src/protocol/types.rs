//! Message kinds and typed payloads for the agent protocol.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::core::task::TaskStatus;

/// Message kind. Closed set; serialized as its snake_case tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Ask an agent to process a task
    TaskRequest,
    /// Answer to a task request
    TaskResponse,
    /// Progress of an in-flight plan
    StatusUpdate,
    /// Hand work to another agent
    CollaborationRequest,
    /// Final outcome of a plan
    Result,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::TaskRequest => "task_request",
            MessageKind::TaskResponse => "task_response",
            MessageKind::StatusUpdate => "status_update",
            MessageKind::CollaborationRequest => "collaboration_request",
            MessageKind::Result => "result",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed message content. The variant determines the message kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    TaskRequest(TaskRequest),
    TaskResponse(TaskResponse),
    StatusUpdate(StatusUpdate),
    CollaborationRequest(Collaboration),
    Result(ExecutionResult),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::TaskRequest(_) => MessageKind::TaskRequest,
            Payload::TaskResponse(_) => MessageKind::TaskResponse,
            Payload::StatusUpdate(_) => MessageKind::StatusUpdate,
            Payload::CollaborationRequest(_) => MessageKind::CollaborationRequest,
            Payload::Result(_) => MessageKind::Result,
        }
    }

    /// Render the payload as a JSON object.
    pub fn to_content(&self) -> serde_json::Result<Value> {
        match self {
            Payload::TaskRequest(p) => serde_json::to_value(p),
            Payload::TaskResponse(p) => serde_json::to_value(p),
            Payload::StatusUpdate(p) => serde_json::to_value(p),
            Payload::CollaborationRequest(p) => serde_json::to_value(p),
            Payload::Result(p) => serde_json::to_value(p),
        }
    }

    /// Decode a JSON object as the payload of the given kind.
    pub fn from_content(kind: MessageKind, content: Value) -> serde_json::Result<Self> {
        Ok(match kind {
            MessageKind::TaskRequest => Payload::TaskRequest(serde_json::from_value(content)?),
            MessageKind::TaskResponse => Payload::TaskResponse(serde_json::from_value(content)?),
            MessageKind::StatusUpdate => Payload::StatusUpdate(serde_json::from_value(content)?),
            MessageKind::CollaborationRequest => {
                Payload::CollaborationRequest(serde_json::from_value(content)?)
            }
            MessageKind::Result => Payload::Result(serde_json::from_value(content)?),
        })
    }
}

/// A task handed to an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRequest {
    pub id: String,
    pub description: String,
    pub submitted_at: f64,
    pub status: TaskStatus,
    /// Unstructured user content.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskRequest {
    pub fn new(id: impl Into<String>, description: impl Into<String>, submitted_at: f64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            submitted_at,
            status: TaskStatus::Submitted,
            extra: Map::new(),
        }
    }
}

/// Response to a task request. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResponse {
    /// `Some(Value::Null)` is a handler that returned `null`; `None` means
    /// the key is absent.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Envelope id of the request being answered.
    pub original_task_id: String,
}

impl TaskResponse {
    pub fn success(original_task_id: impl Into<String>, result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
            original_task_id: original_task_id.into(),
        }
    }

    pub fn failure(original_task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
            original_task_id: original_task_id.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Wrap any value that is present on the wire, including `null`.
fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Task category chosen by the planner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    DataAnalysis,
    WebScraping,
    Calculation,
    TextProcessing,
    Generic,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::DataAnalysis => "data_analysis",
            TaskType::WebScraping => "web_scraping",
            TaskType::Calculation => "calculation",
            TaskType::TextProcessing => "text_processing",
            TaskType::Generic => "generic",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered breakdown of a task into subtasks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub task_id: String,
    pub original_task: String,
    pub task_type: TaskType,
    pub subtasks: Vec<String>,
    pub estimated_duration: u64,
}

/// Collaboration request body, tagged by `action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Collaboration {
    ExecutePlan { plan: Plan },
}

/// Outcome of a single subtask.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Success,
    Failed,
}

/// What a subtask produced, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubtaskDetail {
    DataOperation { records_processed: u64 },
    Calculation { result: i64 },
    Report { pages_generated: u32 },
    Generic { operation: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubtaskOutcome {
    pub subtask: String,
    pub status: SubtaskStatus,
    #[serde(flatten)]
    pub detail: SubtaskDetail,
}

impl SubtaskOutcome {
    pub fn success(subtask: impl Into<String>, detail: SubtaskDetail) -> Self {
        Self {
            subtask: subtask.into(),
            status: SubtaskStatus::Success,
            detail,
        }
    }

    pub fn failed(subtask: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subtask: subtask.into(),
            status: SubtaskStatus::Failed,
            detail: SubtaskDetail::Error {
                message: message.into(),
            },
        }
    }
}

/// Progress report for an in-flight plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub task_id: String,
    pub progress: f64,
    pub current_subtask: String,
    pub subtask_result: SubtaskOutcome,
}

/// Overall outcome of a plan execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Completed,
    CompletedWithFailures,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionReport {
    pub plan_id: String,
    pub subtask_results: Vec<SubtaskOutcome>,
    pub overall_status: OverallStatus,
    pub total_subtasks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub execution_complete: bool,
    pub results: ExecutionReport,
}
