//! System assembly: binds protocol roles to registered agents up front.

use std::sync::Arc;
use std::time::Duration;

use super::router::Router;
use super::task::TaskRecord;
use crate::agent::{Agent, AgentHandle};
use crate::agents::{Executor, Planner};
use crate::config::{validate_settings, Settings};
use crate::error::{Error, Result};

/// Collects agents and checks that every role the protocol relies on is
/// bound before anything runs.
pub struct SystemBuilder {
    settings: Settings,
    agents: Vec<Arc<AgentHandle>>,
}

impl SystemBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            agents: Vec::new(),
        }
    }

    pub fn agent(self, agent: impl Agent) -> Self {
        self.handle(AgentHandle::new(agent))
    }

    pub fn handle(mut self, handle: Arc<AgentHandle>) -> Self {
        self.agents.push(handle);
        self
    }

    pub fn build(self) -> Result<System> {
        validate_settings(&self.settings)?;

        let router = Router::new(self.settings.roles.clone());
        for handle in self.agents {
            router.register(handle);
        }

        let roles = router.roles().clone();
        for (role, name) in [("planner", roles.planner), ("executor", roles.executor)] {
            if router.agent(&name).is_none() {
                return Err(Error::UnboundRole { role, name });
            }
        }

        for (role, name) in [("coordinator", &roles.coordinator), ("user", &roles.user)] {
            if router.agent(name).is_some() {
                tracing::warn!(
                    agent = %name,
                    "Agent registered under the {} role shadows the router", role
                );
            }
        }

        Ok(System {
            router,
            settings: self.settings,
        })
    }
}

/// An assembled set of agents around one router.
pub struct System {
    router: Arc<Router>,
    settings: Settings,
}

impl System {
    /// The standard planner and executor pair.
    pub fn standard(settings: Settings) -> Result<Self> {
        let planner = Planner::from_settings(&settings);
        let executor = Executor::from_settings(&settings);
        SystemBuilder::new(settings)
            .agent(planner)
            .agent(executor)
            .build()
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start all agents. Returns how many were started.
    pub fn start(&self) -> usize {
        self.router.start_all()
    }

    pub async fn shutdown(&self) {
        self.router.stop_all().await;
    }

    /// Poll a task until it reaches a terminal status or `timeout` elapses.
    /// Returns the last known record.
    pub async fn wait_for_task(&self, task_id: &str, timeout: Duration) -> Option<TaskRecord> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let record = self.router.get_task_status(task_id)?;
            if record.status.is_terminal() || tokio::time::Instant::now() >= deadline {
                return Some(record);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
