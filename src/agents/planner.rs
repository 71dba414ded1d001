//! Planner role: deterministic task classification and plan hand-off.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::agent::{Agent, AgentContext};
use crate::config::Settings;
use crate::error::Result;
use crate::protocol::{Collaboration, Envelope, Payload, Plan, TaskRequest, TaskType};

/// Seconds of estimated work per subtask.
const SECONDS_PER_SUBTASK: u64 = 2;

/// Breaks tasks into plans and hands them to the executor.
pub struct Planner {
    name: String,
    executor: String,
    coordinator: String,
    think: Duration,
}

impl Planner {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            name: settings.roles.planner.clone(),
            executor: settings.roles.executor.clone(),
            coordinator: settings.roles.coordinator.clone(),
            think: Duration::from_millis(settings.timing.planner_think_ms),
        }
    }

    /// Build the plan for a task. Pure and deterministic.
    pub fn plan(&self, task: &TaskRequest) -> Plan {
        let task_type = classify(&task.description);
        let subtasks: Vec<String> = subtasks_for(task_type)
            .iter()
            .map(|s| s.to_string())
            .collect();

        Plan {
            task_id: task.id.clone(),
            original_task: task.description.clone(),
            task_type,
            estimated_duration: subtasks.len() as u64 * SECONDS_PER_SUBTASK,
            subtasks,
        }
    }
}

#[async_trait]
impl Agent for Planner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_task(&self, ctx: &AgentContext, task: TaskRequest) -> Result<Value> {
        tracing::info!(agent = %self.name, task = %task.id, "Analyzing task: {}", task.description);

        if !self.think.is_zero() {
            tokio::time::sleep(self.think).await;
        }

        let plan = self.plan(&task);
        tracing::info!(
            agent = %self.name,
            task_type = %plan.task_type,
            "Created plan with {} subtasks",
            plan.subtasks.len()
        );

        // An undeliverable hand-off is dead-lettered by the router; the plan
        // is still the answer to the request.
        if let Err(e) = ctx.send_message(
            &self.executor,
            Payload::CollaborationRequest(Collaboration::ExecutePlan { plan: plan.clone() }),
        ) {
            tracing::warn!(agent = %self.name, task = %plan.task_id, "Plan not handed off: {}", e);
        }

        Ok(serde_json::to_value(plan)?)
    }

    async fn handle_other(&self, ctx: &AgentContext, envelope: &Envelope) -> Result<()> {
        match envelope.payload() {
            Payload::Result(result) => {
                tracing::info!(
                    agent = %self.name,
                    task = %result.results.plan_id,
                    status = ?result.results.overall_status,
                    "Plan execution finished"
                );
                if let Err(e) = ctx.send_message(&self.coordinator, Payload::Result(result.clone()))
                {
                    tracing::warn!(agent = %self.name, "Result not forwarded: {}", e);
                }
            }
            _ => {
                tracing::debug!(agent = %self.name, kind = %envelope.kind(), "Ignoring message");
            }
        }
        Ok(())
    }
}

/// Classify a description. First match wins, in the order data analysis,
/// web scraping, calculation, text processing; anything else is generic.
pub fn classify(description: &str) -> TaskType {
    let d = description.to_lowercase();

    if has_any(&d, &["analyze", "data", "statistics"]) {
        return TaskType::DataAnalysis;
    }
    if has_any(&d, &["scrape", "web", "extract"]) {
        return TaskType::WebScraping;
    }
    if has_any(&d, &["calculate", "compute", "math"]) {
        return TaskType::Calculation;
    }
    if has_any(&d, &["text", "process", "format"]) {
        return TaskType::TextProcessing;
    }
    TaskType::Generic
}

/// The fixed subtask template for a task type.
pub fn subtasks_for(task_type: TaskType) -> &'static [&'static str] {
    match task_type {
        TaskType::DataAnalysis => &["collect_data", "clean_data", "analyze_data", "generate_report"],
        TaskType::WebScraping => &[
            "identify_sources",
            "extract_data",
            "validate_data",
            "store_results",
        ],
        TaskType::Calculation => &[
            "parse_input",
            "perform_calculation",
            "validate_result",
            "format_output",
        ],
        TaskType::TextProcessing => &[
            "tokenize_text",
            "process_content",
            "apply_transformations",
            "generate_output",
        ],
        TaskType::Generic => &[
            "understand_requirements",
            "gather_resources",
            "execute_main_task",
            "verify_results",
        ],
    }
}

fn has_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| text.contains(term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Roles;
    use crate::core::{Router, TaskStatus};
    use crate::protocol::MessageKind;
    use crate::testing::{wait_until, Recorder};

    #[test]
    fn test_classify_categories() {
        let cases = [
            ("Analyze sales data from Q3 2024", TaskType::DataAnalysis),
            ("Show me STATISTICS", TaskType::DataAnalysis),
            ("Scrape product information", TaskType::WebScraping),
            ("Search the web for prices", TaskType::WebScraping),
            (
                "Calculate the compound interest for $1000 at 5% annually for 10 years",
                TaskType::Calculation,
            ),
            ("Do some math", TaskType::Calculation),
            ("Process and format the user manual", TaskType::TextProcessing),
            ("Write a poem", TaskType::Generic),
            ("", TaskType::Generic),
        ];

        for (description, expected) in cases {
            assert_eq!(classify(description), expected, "{}", description);
        }
    }

    #[test]
    fn test_classify_priority_order() {
        assert_eq!(classify("analyze and calculate"), TaskType::DataAnalysis);
        assert_eq!(classify("extract text"), TaskType::WebScraping);
        assert_eq!(classify("compute and format"), TaskType::Calculation);
    }

    #[test]
    fn test_plan_shape() {
        let planner = Planner::from_settings(&Settings::instant());
        let task = TaskRequest::new("task_1_1700000000", "Calculate compound interest", 1.0);
        let plan = planner.plan(&task);

        assert_eq!(plan.task_id, "task_1_1700000000");
        assert_eq!(plan.original_task, "Calculate compound interest");
        assert_eq!(plan.task_type, TaskType::Calculation);
        assert_eq!(
            plan.subtasks,
            vec![
                "parse_input",
                "perform_calculation",
                "validate_result",
                "format_output"
            ]
        );
        assert_eq!(plan.estimated_duration, 8);
    }

    #[test]
    fn test_every_template_has_four_steps() {
        for task_type in [
            TaskType::DataAnalysis,
            TaskType::WebScraping,
            TaskType::Calculation,
            TaskType::TextProcessing,
            TaskType::Generic,
        ] {
            assert_eq!(subtasks_for(task_type).len(), 4);
        }
    }

    #[tokio::test]
    async fn test_plan_survives_missing_executor() {
        let router = Router::new(Roles::default());
        router.register_agent(Planner::from_settings(&Settings::instant()));
        router.start_all();

        let id = router.submit_task("Calculate the compound interest");

        assert!(
            wait_until(|| router.get_task_status(&id).unwrap().status == TaskStatus::Planned)
                .await
        );
        let record = router.get_task_status(&id).unwrap();
        assert_eq!(record.plan.unwrap()["task_type"], "calculation");
        assert!(record.error.is_none());

        let dead = router.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].envelope.recipient(), "Executor");
        assert_eq!(dead[0].envelope.kind(), MessageKind::CollaborationRequest);

        router.stop_all().await;
    }

    #[tokio::test]
    async fn test_planner_hands_plan_to_executor() {
        let settings = Settings::instant();
        let router = Router::new(Roles::default());
        let planner = router.register_agent(Planner::from_settings(&settings));
        let (recorder, seen) = Recorder::new("Executor");
        router.register_agent(recorder);
        router.start_all();

        let id = router.submit_task("Scrape competitor pricing");

        assert!(wait_until(|| !seen.lock().unwrap().is_empty()).await);
        let handed = seen.lock().unwrap()[0].clone();
        assert_eq!(handed.sender(), "Planner");
        assert_eq!(handed.kind(), MessageKind::CollaborationRequest);
        match handed.payload() {
            Payload::CollaborationRequest(Collaboration::ExecutePlan { plan }) => {
                assert_eq!(plan.task_id, id);
                assert_eq!(plan.task_type, TaskType::WebScraping);
            }
            other => panic!("unexpected payload {:?}", other),
        }

        assert!(
            wait_until(|| router.get_task_status(&id).unwrap().status == TaskStatus::Planned)
                .await
        );
        let record = router.get_task_status(&id).unwrap();
        assert_eq!(record.plan.unwrap()["task_type"], "web_scraping");

        planner.stop().await;
        router.stop_all().await;
    }
}
