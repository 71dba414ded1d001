//! Message router: agent registry, delivery, history, and task intake.
//!
//! Every routed envelope is appended to the history before delivery is
//! attempted, so the audit trail also covers messages that could not be
//! delivered. Envelopes addressed to the coordinator or user role are
//! absorbed by the router itself and update the task table.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use super::lock;
use super::task::{task_id, TaskRecord, TaskStatus};
use crate::agent::{Agent, AgentHandle};
use crate::config::Roles;
use crate::error::{Error, Result};
use crate::protocol::{current_timestamp, Envelope, OverallStatus, Payload};

/// Where a routed envelope ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued in a registered agent's inbox.
    Inbox,
    /// Consumed by the router (coordinator or user role).
    Absorbed,
}

/// An envelope that could not be delivered.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub envelope: Envelope,
    pub reason: String,
}

#[derive(Default)]
struct RouterState {
    agents: HashMap<String, Arc<AgentHandle>>,
    history: Vec<Envelope>,
    tasks: HashMap<String, TaskRecord>,
    task_order: Vec<String>,
    /// Request envelope id -> task id, for matching responses.
    requests: HashMap<String, String>,
    dead_letters: Vec<DeadLetter>,
    task_counter: u64,
}

/// Process-wide hub that delivers envelopes by recipient name.
pub struct Router {
    roles: Roles,
    state: Mutex<RouterState>,
}

impl Router {
    pub fn new(roles: Roles) -> Arc<Self> {
        Arc::new(Self {
            roles,
            state: Mutex::new(RouterState::default()),
        })
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    fn state(&self) -> MutexGuard<'_, RouterState> {
        lock(&self.state)
    }

    /// Register an agent handle, replacing any agent with the same name.
    pub fn register(self: &Arc<Self>, handle: Arc<AgentHandle>) {
        handle.attach(self);
        let name = handle.name().to_string();

        if self.state().agents.insert(name.clone(), handle).is_some() {
            tracing::warn!(agent = %name, "Replaced previously registered agent");
        }
        tracing::info!(agent = %name, "Registered agent");
    }

    /// Wrap and register an agent in one step.
    pub fn register_agent(self: &Arc<Self>, agent: impl Agent) -> Arc<AgentHandle> {
        let handle = AgentHandle::new(agent);
        self.register(Arc::clone(&handle));
        handle
    }

    /// Remove an agent from the registry and detach it.
    pub fn unregister(&self, name: &str) -> Option<Arc<AgentHandle>> {
        let handle = self.state().agents.remove(name)?;
        handle.detach();
        tracing::info!(agent = %name, "Unregistered agent");
        Some(handle)
    }

    pub fn agent(&self, name: &str) -> Option<Arc<AgentHandle>> {
        self.state().agents.get(name).cloned()
    }

    /// Registered agent names, sorted.
    pub fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().agents.keys().cloned().collect();
        names.sort();
        names
    }

    /// Record an envelope in the history and deliver it.
    pub fn route(&self, envelope: Envelope) -> Result<Delivery> {
        let mut state = self.state();
        self.route_locked(&mut state, envelope)
    }

    fn route_locked(&self, state: &mut RouterState, envelope: Envelope) -> Result<Delivery> {
        state.history.push(envelope.clone());
        let recipient = envelope.recipient().to_string();

        tracing::debug!(
            from = envelope.sender(),
            to = %recipient,
            kind = %envelope.kind(),
            id = envelope.id(),
            "Routing message"
        );

        if let Some(agent) = state.agents.get(&recipient).cloned() {
            return match agent.deliver(envelope.clone()) {
                Ok(()) => Ok(Delivery::Inbox),
                Err(e) => {
                    tracing::error!(to = %recipient, "Delivery failed: {}", e);
                    state.dead_letters.push(DeadLetter {
                        envelope,
                        reason: e.to_string(),
                    });
                    Err(e)
                }
            };
        }

        if recipient == self.roles.coordinator || recipient == self.roles.user {
            self.absorb(state, &envelope);
            return Ok(Delivery::Absorbed);
        }

        tracing::warn!(
            from = envelope.sender(),
            kind = %envelope.kind(),
            "Unknown recipient: {}", recipient
        );
        state.dead_letters.push(DeadLetter {
            envelope,
            reason: format!("unknown recipient: {}", recipient),
        });
        Err(Error::UnknownRecipient(recipient))
    }

    /// Apply a message addressed to the router's own roles to the task table.
    fn absorb(&self, state: &mut RouterState, envelope: &Envelope) {
        let to_user = envelope.recipient() == self.roles.user;
        let to_coordinator = envelope.recipient() == self.roles.coordinator;

        match envelope.payload() {
            Payload::TaskResponse(response) if to_user => {
                let Some(task_id) = state.requests.get(&response.original_task_id).cloned() else {
                    tracing::debug!(
                        request = %response.original_task_id,
                        "Response to an unknown request"
                    );
                    return;
                };
                let Some(task) = state.tasks.get_mut(&task_id) else {
                    return;
                };
                match (&response.result, &response.error) {
                    (_, Some(error)) => {
                        task.fail(error.clone());
                        tracing::warn!(task = %task_id, "Task failed: {}", error);
                    }
                    (Some(plan), None) => {
                        task.plan = Some(plan.clone());
                        task.advance(TaskStatus::Planned);
                        tracing::info!(task = %task_id, "Task planned");
                    }
                    (None, None) => {}
                }
            }
            Payload::StatusUpdate(update) if to_coordinator => {
                let Some(task) = state.tasks.get_mut(&update.task_id) else {
                    tracing::debug!(task = %update.task_id, "Status update for unknown task");
                    return;
                };
                task.advance(TaskStatus::InProgress);
                task.progress = task.progress.max(update.progress);
                tracing::info!(
                    task = %update.task_id,
                    subtask = %update.current_subtask,
                    "Progress {:.0}%",
                    update.progress * 100.0
                );
            }
            Payload::Result(result) if to_coordinator => {
                let report = &result.results;
                let Some(task) = state.tasks.get_mut(&report.plan_id) else {
                    tracing::debug!(task = %report.plan_id, "Result for unknown task");
                    return;
                };
                task.report = Some(report.clone());
                if report.overall_status == OverallStatus::Aborted {
                    let failed_at = report
                        .subtask_results
                        .last()
                        .map(|o| o.subtask.as_str())
                        .unwrap_or("<none>");
                    task.fail(format!("plan aborted at subtask {}", failed_at));
                    tracing::warn!(task = %report.plan_id, "Task aborted");
                } else {
                    task.advance(TaskStatus::Completed);
                    tracing::info!(
                        task = %report.plan_id,
                        subtasks = report.total_subtasks,
                        "Task completed"
                    );
                }
            }
            _ => {
                tracing::debug!(
                    to = envelope.recipient(),
                    kind = %envelope.kind(),
                    "Absorbed message without effect"
                );
            }
        }
    }

    /// Record a new task and hand it to the planner role. Returns at once.
    pub fn submit_task(&self, description: &str) -> String {
        let mut state = self.state();

        state.task_counter += 1;
        let id = task_id(state.task_counter, chrono::Utc::now().timestamp());
        let record = TaskRecord::new(&id, description, current_timestamp());
        let envelope = Envelope::new(
            &self.roles.user,
            &self.roles.planner,
            Payload::TaskRequest(record.to_request()),
        );

        state.requests.insert(envelope.id().to_string(), id.clone());
        state.tasks.insert(id.clone(), record);
        state.task_order.push(id.clone());

        tracing::info!(task = %id, "New task submitted: {}", description);

        if let Err(e) = self.route_locked(&mut state, envelope) {
            if let Some(task) = state.tasks.get_mut(&id) {
                task.fail(e.to_string());
            }
        }

        id
    }

    pub fn get_task_status(&self, task_id: &str) -> Option<TaskRecord> {
        self.state().tasks.get(task_id).cloned()
    }

    /// All task records in submission order.
    pub fn tasks(&self) -> Vec<TaskRecord> {
        let state = self.state();
        state
            .task_order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect()
    }

    /// The last `limit` routed envelopes, oldest first. `limit <= 0` returns
    /// the whole history.
    pub fn get_message_history(&self, limit: i64) -> Vec<Envelope> {
        let state = self.state();
        let len = state.history.len();
        let start = if limit <= 0 {
            0
        } else {
            len.saturating_sub(limit as usize)
        };
        state.history[start..].to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.state().history.len()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state().dead_letters.clone()
    }

    fn handles(&self) -> Vec<Arc<AgentHandle>> {
        let state = self.state();
        let mut handles: Vec<Arc<AgentHandle>> = state.agents.values().cloned().collect();
        handles.sort_by(|a, b| a.name().cmp(b.name()));
        handles
    }

    /// Start every registered agent that is not already running. Returns the
    /// number of agents started.
    pub fn start_all(&self) -> usize {
        tracing::info!("Starting all agents...");
        let mut started = 0;
        for handle in self.handles() {
            if handle.is_running() {
                continue;
            }
            match handle.start() {
                Ok(()) => started += 1,
                Err(e) => tracing::warn!(agent = handle.name(), "Could not start: {}", e),
            }
        }
        started
    }

    /// Stop every agent, one after the other.
    pub async fn stop_all(&self) {
        tracing::info!("Stopping all agents...");
        for handle in self.handles() {
            handle.stop().await;
        }
    }

    /// Snapshot of the system for display.
    pub fn status(&self) -> RouterStatus {
        let state = self.state();
        let mut agents: Vec<String> = state.agents.keys().cloned().collect();
        agents.sort();

        let tasks = state
            .task_order
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .map(|t| TaskSummary {
                id: t.id.clone(),
                description: t.description.clone(),
                status: t.status,
                progress: t.progress,
            })
            .collect();

        let recent_start = state.history.len().saturating_sub(3);

        RouterStatus {
            agents,
            tasks,
            history_len: state.history.len(),
            dead_letters: state.dead_letters.len(),
            recent: state.history[recent_start..].to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterStatus {
    pub agents: Vec<String>,
    pub tasks: Vec<TaskSummary>,
    pub history_len: usize,
    pub dead_letters: usize,
    pub recent: Vec<Envelope>,
}

impl fmt::Display for RouterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "System Status")?;
        writeln!(f, "Active Agents: {}", self.agents.len())?;
        for name in &self.agents {
            writeln!(f, "  - {}", name)?;
        }

        writeln!(f, "Tasks: {}", self.tasks.len())?;
        for task in &self.tasks {
            let description: String = task.description.chars().take(50).collect();
            writeln!(
                f,
                "  - {} [{} {:.0}%]: {}",
                task.id,
                task.status,
                task.progress * 100.0,
                description
            )?;
        }

        writeln!(f, "Message History: {} messages", self.history_len)?;
        writeln!(f, "Dead Letters: {}", self.dead_letters)?;
        if !self.recent.is_empty() {
            writeln!(f, "Recent Messages:")?;
            for msg in &self.recent {
                writeln!(f, "  {} -> {}: {}", msg.sender(), msg.recipient(), msg.kind())?;
            }
        }
        Ok(())
    }
}
