//! Agent communication protocol.
//!
//! - Immutable message envelopes with a fixed wire shape
//! - A closed set of message kinds
//! - Typed payloads per kind, including the planner/executor collaboration
//!   messages

pub mod envelope;
pub mod types;

pub use envelope::{current_timestamp, Envelope, WireEnvelope};
pub use types::{
    Collaboration, ExecutionReport, ExecutionResult, MessageKind, OverallStatus, Payload, Plan,
    StatusUpdate, SubtaskDetail, SubtaskOutcome, SubtaskStatus, TaskRequest, TaskResponse,
    TaskType,
};
