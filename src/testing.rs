//! Test helpers shared across modules.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::agent::{Agent, AgentContext};
use crate::error::Result;
use crate::protocol::{Collaboration, Envelope, TaskRequest};

/// Records every non-task envelope it receives; echoes task descriptions.
pub struct Recorder {
    name: String,
    seen: Arc<Mutex<Vec<Envelope>>>,
}

impl Recorder {
    pub fn new(name: &str) -> (Self, Arc<Mutex<Vec<Envelope>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name: name.to_string(),
                seen: Arc::clone(&seen),
            },
            seen,
        )
    }
}

#[async_trait]
impl Agent for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_task(&self, _ctx: &AgentContext, task: TaskRequest) -> Result<Value> {
        Ok(json!({ "echo": task.description }))
    }

    async fn handle_collaboration_request(
        &self,
        _ctx: &AgentContext,
        envelope: &Envelope,
        _request: Collaboration,
    ) -> Result<()> {
        self.seen.lock().unwrap().push(envelope.clone());
        Ok(())
    }

    async fn handle_other(&self, _ctx: &AgentContext, envelope: &Envelope) -> Result<()> {
        self.seen.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
