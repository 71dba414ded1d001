//! Built-in agents implementing the planner/executor collaboration protocol.
//!
//! The planner classifies a task, sends the plan to the executor as a
//! `collaboration_request`, and answers the requester with the plan. The
//! executor runs the subtasks in order, reports progress to the coordinator
//! after each step, and sends one `result` back to the planner, which
//! forwards it to the coordinator.

pub mod executor;
pub mod planner;

pub use executor::{simulate, Executor, SimulatedRunner, SubtaskRunner};
pub use planner::{classify, subtasks_for, Planner};

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use crate::config::Settings;
    use crate::core::{System, TaskStatus};
    use crate::protocol::{MessageKind, OverallStatus, Payload, TaskType};

    #[tokio::test]
    async fn test_compound_interest_scenario() {
        crate::logging::init_test();
        let system = System::standard(Settings::instant()).unwrap();
        system.start();
        let router = system.router();

        let id = router
            .submit_task("Calculate the compound interest for $1000 at 5% annually for 10 years");
        let record = system
            .wait_for_task(&id, Duration::from_secs(5))
            .await
            .unwrap();
        system.shutdown().await;

        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.progress, 1.0);
        let plan = record.plan.unwrap();
        assert_eq!(plan["task_type"], "calculation");
        assert_eq!(
            plan["subtasks"],
            serde_json::json!([
                "parse_input",
                "perform_calculation",
                "validate_result",
                "format_output"
            ])
        );

        let history = router.get_message_history(0);

        let progress: Vec<f64> = history
            .iter()
            .filter_map(|e| match e.payload() {
                Payload::StatusUpdate(u) if e.recipient() == "Coordinator" => Some(u.progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![0.25, 0.5, 0.75, 1.0]);

        let results: Vec<_> = history
            .iter()
            .filter(|e| e.kind() == MessageKind::Result && e.recipient() == "Planner")
            .collect();
        assert_eq!(results.len(), 1);
        match results[0].payload() {
            Payload::Result(result) => {
                assert!(result.execution_complete);
                assert_eq!(result.results.total_subtasks, 4);
                assert_eq!(result.results.overall_status, OverallStatus::Completed);
            }
            other => panic!("unexpected payload {:?}", other),
        }

        // The first message is the task request, and it is the only one.
        assert_eq!(history[0].kind(), MessageKind::TaskRequest);
        assert_eq!(history[0].recipient(), "Planner");
        assert_eq!(
            history
                .iter()
                .filter(|e| e.kind() == MessageKind::TaskRequest)
                .count(),
            1
        );
        assert!(router.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_tasks_complete_with_unique_ids() {
        let system = System::standard(Settings::instant()).unwrap();
        system.start();
        let router = system.router();

        let descriptions = [
            "Analyze sales data from Q3 2024 and generate insights report",
            "Scrape product information from e-commerce sites",
            "Process and format the user manual text",
            "Plan a birthday party",
        ];
        let ids: Vec<String> = descriptions
            .iter()
            .map(|d| router.submit_task(d))
            .collect();

        for id in &ids {
            let record = system
                .wait_for_task(id, Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(record.status, TaskStatus::Completed, "{}", id);
        }
        system.shutdown().await;

        let types: Vec<String> = ids
            .iter()
            .map(|id| {
                let plan = router.get_task_status(id).unwrap().plan.unwrap();
                plan["task_type"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(
            types,
            vec![
                TaskType::DataAnalysis.as_str(),
                TaskType::WebScraping.as_str(),
                TaskType::TextProcessing.as_str(),
                TaskType::Generic.as_str(),
            ]
        );

        let history = router.get_message_history(0);
        let unique: HashSet<&str> = history.iter().map(|e| e.id()).collect();
        assert_eq!(unique.len(), history.len());
        assert_eq!(unique.len(), router.history_len());
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 4);
    }
}
