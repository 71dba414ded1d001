//! Executor role: runs plans step by step and reports progress.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::agent::{Agent, AgentContext};
use crate::config::{FailurePolicy, Settings};
use crate::error::Result;
use crate::protocol::{
    Collaboration, Envelope, ExecutionReport, ExecutionResult, OverallStatus, Payload, Plan,
    StatusUpdate, SubtaskDetail, SubtaskOutcome, SubtaskStatus, TaskRequest,
};

/// Executes a single named subtask.
#[async_trait]
pub trait SubtaskRunner: Send + Sync {
    async fn run(&self, subtask: &str) -> Result<SubtaskDetail>;
}

/// Stands in for real work: waits, then reports a canned outcome chosen by
/// the subtask's name.
pub struct SimulatedRunner {
    step: Duration,
}

impl SimulatedRunner {
    pub fn new(step: Duration) -> Self {
        Self { step }
    }
}

#[async_trait]
impl SubtaskRunner for SimulatedRunner {
    async fn run(&self, subtask: &str) -> Result<SubtaskDetail> {
        if !self.step.is_zero() {
            tokio::time::sleep(self.step).await;
        }
        Ok(simulate(subtask))
    }
}

/// Name-based outcome of a simulated subtask.
pub fn simulate(subtask: &str) -> SubtaskDetail {
    let name = subtask.to_lowercase();

    if name.contains("data") {
        SubtaskDetail::DataOperation {
            records_processed: 100,
        }
    } else if name.contains("calculate") {
        SubtaskDetail::Calculation { result: 42 }
    } else if name.contains("report") {
        SubtaskDetail::Report { pages_generated: 5 }
    } else {
        SubtaskDetail::Generic {
            operation: subtask.to_string(),
        }
    }
}

/// Runs plans handed over by the planner.
pub struct Executor {
    name: String,
    planner: String,
    coordinator: String,
    policy: FailurePolicy,
    task_delay: Duration,
    runner: Arc<dyn SubtaskRunner>,
}

impl Executor {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            name: settings.roles.executor.clone(),
            planner: settings.roles.planner.clone(),
            coordinator: settings.roles.coordinator.clone(),
            policy: settings.executor.failure_policy,
            task_delay: Duration::from_millis(settings.timing.executor_task_ms),
            runner: Arc::new(SimulatedRunner::new(Duration::from_millis(
                settings.timing.executor_step_ms,
            ))),
        }
    }

    /// Replace the subtask runner.
    pub fn with_runner(mut self, runner: impl SubtaskRunner + 'static) -> Self {
        self.runner = Arc::new(runner);
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Execute the plan's subtasks in order, sending a status update to the
    /// coordinator after each one and a single result to the planner at the
    /// end.
    pub async fn execute_plan(&self, ctx: &AgentContext, plan: &Plan) -> Result<ExecutionReport> {
        let total = plan.subtasks.len();
        tracing::info!(agent = %self.name, task = %plan.task_id, "Executing plan with {} subtasks", total);

        let mut results = Vec::with_capacity(total);
        let mut overall = OverallStatus::Completed;

        for (i, subtask) in plan.subtasks.iter().enumerate() {
            tracing::debug!(agent = %self.name, "Executing subtask {}/{}: {}", i + 1, total, subtask);

            let outcome = match self.runner.run(subtask).await {
                Ok(detail) => SubtaskOutcome::success(subtask, detail),
                Err(e) => {
                    tracing::warn!(agent = %self.name, subtask = %subtask, "Subtask failed: {}", e);
                    SubtaskOutcome::failed(subtask, e.to_string())
                }
            };
            let failed = outcome.status == SubtaskStatus::Failed;

            if let Err(e) = ctx.send_message(
                &self.coordinator,
                Payload::StatusUpdate(StatusUpdate {
                    task_id: plan.task_id.clone(),
                    progress: (i + 1) as f64 / total as f64,
                    current_subtask: subtask.clone(),
                    subtask_result: outcome.clone(),
                }),
            ) {
                tracing::warn!(agent = %self.name, subtask = %subtask, "Status update not delivered: {}", e);
            }
            results.push(outcome);

            if failed {
                match self.policy {
                    FailurePolicy::Continue => overall = OverallStatus::CompletedWithFailures,
                    FailurePolicy::Abort => {
                        overall = OverallStatus::Aborted;
                        break;
                    }
                }
            }
        }

        let report = ExecutionReport {
            plan_id: plan.task_id.clone(),
            subtask_results: results,
            overall_status: overall,
            total_subtasks: total,
        };

        if let Err(e) = ctx.send_message(
            &self.planner,
            Payload::Result(ExecutionResult {
                execution_complete: overall != OverallStatus::Aborted,
                results: report.clone(),
            }),
        ) {
            tracing::warn!(agent = %self.name, task = %plan.task_id, "Result not delivered: {}", e);
        }

        tracing::info!(agent = %self.name, task = %plan.task_id, status = ?overall, "Finished plan");
        Ok(report)
    }
}

#[async_trait]
impl Agent for Executor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_task(&self, _ctx: &AgentContext, task: TaskRequest) -> Result<Value> {
        tracing::info!(agent = %self.name, "Executing task: {}", task.description);

        if !self.task_delay.is_zero() {
            tokio::time::sleep(self.task_delay).await;
        }

        Ok(json!({
            "task_completed": true,
            "execution_time": self.task_delay.as_secs_f64(),
            "output": format!("Successfully executed: {}", task.description),
            "status": "completed"
        }))
    }

    async fn handle_collaboration_request(
        &self,
        ctx: &AgentContext,
        _envelope: &Envelope,
        request: Collaboration,
    ) -> Result<()> {
        match request {
            Collaboration::ExecutePlan { plan } => {
                self.execute_plan(ctx, &plan).await?;
            }
        }
        Ok(())
    }
}
