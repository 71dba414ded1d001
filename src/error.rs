//! Error types for agentrelay.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("Agent {0} is not attached to a router")]
    Detached(String),

    #[error("Agent {0} is already running")]
    AlreadyRunning(String),

    #[error("No agent registered for role {role} (expected '{name}')")]
    UnboundRole { role: &'static str, name: String },

    #[error("Inbox closed for agent {0}")]
    InboxClosed(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn handler(s: impl Into<String>) -> Self {
        Error::Handler(s.into())
    }
}
