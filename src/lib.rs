//! agentrelay library root.

pub mod agent;
pub mod agents;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod protocol;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentContext, AgentHandle};
pub use agents::{Executor, Planner};
pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use crate::core::{Router, System, SystemBuilder, TaskRecord, TaskStatus};
pub use error::{Error, Result};
pub use protocol::{Envelope, MessageKind, Payload};
