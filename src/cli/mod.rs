//! CLI commands for agentrelay using clap.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{load_settings, load_settings_from, Settings};
use crate::core::{System, TaskStatus};
use crate::protocol::Envelope;

/// agentrelay - planner and executor agents collaborating over a message router.
#[derive(Parser)]
#[command(name = "agentrelay")]
#[command(version = "0.1.0")]
#[command(about = "agentrelay - actor-style agents exchanging typed messages", long_about = None)]
pub struct Commands {
    /// Settings file (defaults to $AGENTRELAY_HOME/settings.json)
    #[arg(long, global = true, env = "AGENTRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Submit one task and wait for it to finish
    Submit {
        /// Task description
        description: String,

        /// Seconds to wait for completion
        #[arg(long, default_value_t = 30)]
        wait: u64,
    },

    /// Run demo scenarios
    Demo {
        #[arg(value_enum, default_value_t = Scenario::All)]
        scenario: Scenario,
    },

    /// Interactive shell: type tasks, inspect status and history
    #[command(alias = "i")]
    Interactive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    #[value(alias = "data")]
    DataAnalysis,
    #[value(alias = "calc")]
    Calculation,
    #[value(alias = "text")]
    TextProcessing,
    #[value(alias = "web")]
    WebScraping,
    All,
}

impl Scenario {
    const EACH: [Scenario; 4] = [
        Scenario::DataAnalysis,
        Scenario::Calculation,
        Scenario::TextProcessing,
        Scenario::WebScraping,
    ];

    fn title(self) -> &'static str {
        match self {
            Scenario::DataAnalysis => "Data Analysis",
            Scenario::Calculation => "Calculation",
            Scenario::TextProcessing => "Text Processing",
            Scenario::WebScraping => "Web Scraping",
            Scenario::All => "All",
        }
    }

    fn task(self) -> &'static str {
        match self {
            Scenario::DataAnalysis => "Analyze sales data from Q3 2024 and generate insights report",
            Scenario::Calculation => {
                "Calculate the compound interest for $1000 at 5% annually for 10 years"
            }
            Scenario::TextProcessing => {
                "Process and format the user manual text for better readability"
            }
            Scenario::WebScraping => {
                "Scrape product information from e-commerce sites and create comparison report"
            }
            Scenario::All => "",
        }
    }

    fn expand(self) -> Vec<Scenario> {
        match self {
            Scenario::All => Self::EACH.to_vec(),
            one => vec![one],
        }
    }
}

impl Commands {
    /// Load settings and run the command.
    pub async fn run(&self) -> Result<()> {
        let settings = self.settings()?;
        self.run_with(settings).await
    }

    /// Run the command with settings that are already loaded.
    pub async fn run_with(&self, settings: Settings) -> Result<()> {
        match &self.command {
            Command::Submit { description, wait } => cmd_submit(settings, description, *wait).await,
            Command::Demo { scenario } => cmd_demo(settings, *scenario).await,
            Command::Interactive => cmd_interactive(settings).await,
        }
    }

    /// Settings from `--config`, or the default location.
    pub fn settings(&self) -> Result<Settings> {
        let settings = match &self.config {
            Some(path) => load_settings_from(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => load_settings()?,
        };
        Ok(settings)
    }
}

// Command implementations

async fn cmd_submit(settings: Settings, description: &str, wait: u64) -> Result<()> {
    let system = System::standard(settings)?;
    system.start();

    let task_id = system.router().submit_task(description);
    println!("Task submitted with ID: {}", task_id);

    let record = system
        .wait_for_task(&task_id, Duration::from_secs(wait))
        .await
        .with_context(|| format!("Task {} disappeared", task_id))?;
    system.shutdown().await;

    if !record.status.is_terminal() {
        tracing::warn!(task = %task_id, "Task still {} after {}s", record.status, wait);
    }

    let history: Vec<Envelope> = system.router().get_message_history(0);
    let output = serde_json::json!({
        "task": record,
        "history": history,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if record.status == TaskStatus::Failed {
        anyhow::bail!(
            "Task {} failed: {}",
            task_id,
            record.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn cmd_demo(settings: Settings, scenario: Scenario) -> Result<()> {
    let system = System::standard(settings)?;
    system.start();

    run_scenarios(&system, scenario).await;

    system.shutdown().await;
    println!("\n{}", system.router().status());
    Ok(())
}

/// Submit each scenario's task in turn and wait for it to settle.
async fn run_scenarios(system: &System, scenario: Scenario) {
    let settle = Duration::from_secs(system.settings().demo.settle_secs);
    let pause = Duration::from_secs(system.settings().demo.pause_secs);

    if scenario == Scenario::All {
        println!("Running all demo scenarios...");
    }

    for (i, one) in scenario.expand().into_iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        println!("\nRunning {} Demo", one.title());
        let task_id = system.router().submit_task(one.task());
        println!("Task ID: {}", task_id);

        match system.wait_for_task(&task_id, settle).await {
            Some(record) => println!(
                "  {} [{} {:.0}%]",
                record.id,
                record.status,
                record.progress * 100.0
            ),
            None => println!("  {} is gone", task_id),
        }
    }

    if scenario == Scenario::All {
        println!("All demos completed!");
    }
}

/// One line typed into the interactive shell.
#[derive(Debug, PartialEq)]
enum ShellCommand<'a> {
    Empty,
    Help,
    Status,
    History(i64),
    Demo(Scenario),
    Quit,
    Submit(&'a str),
}

/// A command word is only a command when followed by nothing or by its one
/// valid argument; any other line is submitted as a task.
fn parse_line(line: &str, default_limit: i64) -> ShellCommand<'_> {
    let line = line.trim();
    let lower = line.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    match words.as_slice() {
        [] => ShellCommand::Empty,
        ["help" | "h"] => ShellCommand::Help,
        ["status" | "s"] => ShellCommand::Status,
        ["quit" | "exit" | "q"] => ShellCommand::Quit,
        ["history"] => ShellCommand::History(default_limit),
        ["history", n] => match n.parse::<i64>() {
            Ok(limit) => ShellCommand::History(limit),
            Err(_) => ShellCommand::Submit(line),
        },
        ["demo"] => ShellCommand::Demo(Scenario::All),
        ["demo", name] => match Scenario::from_str(name, true) {
            Ok(scenario) => ShellCommand::Demo(scenario),
            Err(_) => ShellCommand::Submit(line),
        },
        _ => ShellCommand::Submit(line),
    }
}

async fn cmd_interactive(settings: Settings) -> Result<()> {
    let default_limit = settings.history.default_limit;
    let system = System::standard(settings)?;
    system.start();

    println!("agentrelay interactive shell");
    println!("Planner and Executor are ready. Type 'help' for commands, 'quit' to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line, default_limit) {
            ShellCommand::Empty => {}
            ShellCommand::Help => print_help(),
            ShellCommand::Status => println!("{}", system.router().status()),
            ShellCommand::History(limit) => print_history(&system.router().get_message_history(limit)),
            ShellCommand::Demo(scenario) => run_scenarios(&system, scenario).await,
            ShellCommand::Quit => break,
            ShellCommand::Submit(description) => {
                let task_id = system.router().submit_task(description);
                println!("Task submitted with ID: {}", task_id);
            }
        }
    }

    system.shutdown().await;
    println!("Goodbye!");
    Ok(())
}

fn print_help() {
    println!("\nAvailable Commands:");
    println!("  help, h           - Show this help message");
    println!("  status, s         - Show system status");
    println!("  history [n]       - Show last n messages");
    println!("  demo [scenario]   - Run demo scenarios (data, calc, text, web, all)");
    println!("  quit, exit, q     - Exit");
    println!("  <any text>        - Submit task to agents");
    println!("\nExample tasks:");
    println!("  Analyze the quarterly sales data");
    println!("  Calculate compound interest for investment");
    println!("  Process customer feedback text");
    println!("  Scrape competitor pricing information\n");
}

fn print_history(messages: &[Envelope]) {
    if messages.is_empty() {
        println!("No messages in history");
        return;
    }

    println!("\nLast {} messages:", messages.len());
    for msg in messages {
        println!(
            "[{:.0}] {} -> {}: {}",
            msg.timestamp(),
            msg.sender(),
            msg.recipient(),
            msg.kind()
        );
    }
    println!();
}
