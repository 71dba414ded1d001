//! Message envelopes: the immutable unit of communication between agents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{MessageKind, Payload};
use crate::error::Error;

/// Message envelope. Identifier and timestamp are fixed at construction and
/// the fields are only reachable through accessors.
///
/// Serializes to the wire shape
/// `{id, sender, recipient, message_type, content, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireEnvelope", try_from = "WireEnvelope")]
pub struct Envelope {
    id: String,
    sender: String,
    recipient: String,
    payload: Payload,
    timestamp: f64,
}

impl Envelope {
    /// Create a new envelope stamped with a fresh id and the current time.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: generate_id(),
            sender: sender.into(),
            recipient: recipient.into(),
            payload,
            timestamp: current_timestamp(),
        }
    }

    /// Create an envelope addressed back to this envelope's sender.
    pub fn reply(&self, from: impl Into<String>, payload: Payload) -> Self {
        Self::new(from, self.sender.clone(), payload)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Creation time in seconds since the Unix epoch.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Render the envelope in its wire shape.
    pub fn to_wire(&self) -> WireEnvelope {
        WireEnvelope::from(self.clone())
    }

    /// Rebuild an envelope from its wire shape.
    pub fn from_wire(wire: WireEnvelope) -> Result<Self, Error> {
        Self::try_from(wire)
    }
}

/// Plain key/value form of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub message_type: MessageKind,
    pub content: Value,
    pub timestamp: f64,
}

impl From<Envelope> for WireEnvelope {
    fn from(envelope: Envelope) -> Self {
        let message_type = envelope.kind();
        // Payloads are plain structs with string keys; rendering cannot fail.
        let content = envelope
            .payload
            .to_content()
            .unwrap_or_else(|_| Value::Object(Default::default()));

        Self {
            id: envelope.id,
            sender: envelope.sender,
            recipient: envelope.recipient,
            message_type,
            content,
            timestamp: envelope.timestamp,
        }
    }
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = Error;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        let payload = Payload::from_content(wire.message_type, wire.content).map_err(|e| {
            Error::Protocol(format!(
                "content of {} does not match {}: {}",
                wire.id, wire.message_type, e
            ))
        })?;

        Ok(Self {
            id: wire.id,
            sender: wire.sender,
            recipient: wire.recipient,
            payload,
            timestamp: wire.timestamp,
        })
    }
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn current_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{
        Collaboration, ExecutionReport, ExecutionResult, OverallStatus, Plan, StatusUpdate,
        SubtaskDetail, SubtaskOutcome, TaskRequest, TaskResponse, TaskType,
    };
    use serde_json::json;
    use std::collections::HashSet;

    fn sample_plan() -> Plan {
        Plan {
            task_id: "task_1_1700000000".to_string(),
            original_task: "Calculate interest".to_string(),
            task_type: TaskType::Calculation,
            subtasks: vec!["parse_input".to_string(), "format_output".to_string()],
            estimated_duration: 4,
        }
    }

    #[test]
    fn test_envelope_creation() {
        let envelope = Envelope::new(
            "User",
            "Planner",
            Payload::TaskRequest(TaskRequest::new("task_1_1", "Fix the bug", 1.0)),
        );

        assert_eq!(envelope.sender(), "User");
        assert_eq!(envelope.recipient(), "Planner");
        assert_eq!(envelope.kind(), MessageKind::TaskRequest);
        assert!(!envelope.id().is_empty());
        assert!(envelope.timestamp() > 1_600_000_000.0);
    }

    #[test]
    fn test_reply_goes_back_to_sender() {
        let request = Envelope::new(
            "User",
            "Planner",
            Payload::TaskRequest(TaskRequest::new("task_1_1", "Fix bug", 1.0)),
        );
        let response = request.reply(
            "Planner",
            Payload::TaskResponse(TaskResponse::success(request.id(), json!({"ok": true}))),
        );

        assert_eq!(response.sender(), "Planner");
        assert_eq!(response.recipient(), "User");
        assert_ne!(response.id(), request.id());
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<String> = (0..1000)
            .map(|i| {
                Envelope::new(
                    "a",
                    "b",
                    Payload::TaskResponse(TaskResponse::success(i.to_string(), json!(i))),
                )
                .id()
                .to_string()
            })
            .collect();

        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_wire_shape() {
        let envelope = Envelope::new(
            "Planner",
            "Executor",
            Payload::CollaborationRequest(Collaboration::ExecutePlan {
                plan: sample_plan(),
            }),
        );
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["message_type"], "collaboration_request");
        assert_eq!(value["sender"], "Planner");
        assert_eq!(value["recipient"], "Executor");
        assert_eq!(value["id"], envelope.id());
        assert_eq!(value["content"]["action"], "execute_plan");
        assert!(value["timestamp"].is_f64());
    }

    #[test]
    fn test_wire_round_trip() {
        let envelopes = vec![
            Envelope::new(
                "Executor",
                "Coordinator",
                Payload::StatusUpdate(StatusUpdate {
                    task_id: "task_1_1700000000".to_string(),
                    progress: 0.25,
                    current_subtask: "collect_data".to_string(),
                    subtask_result: SubtaskOutcome::success(
                        "collect_data",
                        SubtaskDetail::DataOperation {
                            records_processed: 100,
                        },
                    ),
                }),
            ),
            Envelope::new(
                "Executor",
                "Planner",
                Payload::Result(ExecutionResult {
                    execution_complete: true,
                    results: ExecutionReport {
                        plan_id: "task_1_1700000000".to_string(),
                        subtask_results: vec![SubtaskOutcome::failed("clean_data", "bad rows")],
                        overall_status: OverallStatus::CompletedWithFailures,
                        total_subtasks: 1,
                    },
                }),
            ),
        ];

        for envelope in envelopes {
            let json = serde_json::to_string(&envelope).unwrap();
            let decoded: Envelope = serde_json::from_str(&json).unwrap();
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_null_task_result_round_trips() {
        let envelope = Envelope::new(
            "Executor",
            "User",
            Payload::TaskResponse(TaskResponse::success("req-1", json!(null))),
        );

        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            wire["content"],
            json!({"original_task_id": "req-1", "result": null})
        );

        let decoded: Envelope = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(serde_json::to_value(&decoded).unwrap(), wire);
    }

    #[test]
    fn test_mismatched_content_is_protocol_error() {
        let wire = WireEnvelope {
            id: "x".to_string(),
            sender: "a".to_string(),
            recipient: "b".to_string(),
            message_type: MessageKind::CollaborationRequest,
            content: json!({"action": "unknown"}),
            timestamp: 1.0,
        };

        assert!(matches!(Envelope::from_wire(wire), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        let raw = json!({
            "id": "x",
            "sender": "a",
            "recipient": "b",
            "message_type": "gossip",
            "content": {},
            "timestamp": 1.0
        });

        assert!(serde_json::from_value::<Envelope>(raw).is_err());
    }
}
