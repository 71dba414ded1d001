//! Configuration loading for agentrelay.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "AGENTRELAY_HOME";

/// Get the agentrelay home directory ($AGENTRELAY_HOME or ~/.agentrelay).
pub fn get_home_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }

    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".agentrelay"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from the default location.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_settings_path()?)
}

/// Load settings from a specific file. A missing file yields the defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        tracing::debug!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid settings file {}: {}", path.display(), e)))?;

    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or return default if they cannot be read.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        Settings::default()
    })
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    let roles = &settings.roles;
    let names = [
        ("planner", &roles.planner),
        ("executor", &roles.executor),
        ("coordinator", &roles.coordinator),
        ("user", &roles.user),
    ];

    for (role, name) in names.iter() {
        if name.trim().is_empty() {
            return Err(Error::Config(format!("roles.{} must not be empty", role)));
        }
    }

    for (i, (role, name)) in names.iter().enumerate() {
        if let Some((other, _)) = names[i + 1..].iter().find(|(_, n)| n == name) {
            return Err(Error::Config(format!(
                "roles.{} and roles.{} both use the name '{}'",
                role, other, name
            )));
        }
    }

    Ok(())
}

/// Well-known names bound to protocol roles at assembly time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Roles {
    #[serde(default = "default_planner")]
    pub planner: String,
    #[serde(default = "default_executor")]
    pub executor: String,
    /// Absorbed by the router itself: progress and completion reports.
    #[serde(default = "default_coordinator")]
    pub coordinator: String,
    /// Sender of submitted tasks; responses to it are absorbed by the router.
    #[serde(default = "default_user")]
    pub user: String,
}

fn default_planner() -> String {
    "Planner".to_string()
}

fn default_executor() -> String {
    "Executor".to_string()
}

fn default_coordinator() -> String {
    "Coordinator".to_string()
}

fn default_user() -> String {
    "User".to_string()
}

impl Default for Roles {
    fn default() -> Self {
        Self {
            planner: default_planner(),
            executor: default_executor(),
            coordinator: default_coordinator(),
            user: default_user(),
        }
    }
}

/// Simulated work delays.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Timing {
    #[serde(default = "default_planner_think_ms")]
    pub planner_think_ms: u64,
    #[serde(default = "default_executor_step_ms")]
    pub executor_step_ms: u64,
    #[serde(default = "default_executor_task_ms")]
    pub executor_task_ms: u64,
}

fn default_planner_think_ms() -> u64 {
    1000
}

fn default_executor_step_ms() -> u64 {
    1000
}

fn default_executor_task_ms() -> u64 {
    2000
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            planner_think_ms: default_planner_think_ms(),
            executor_step_ms: default_executor_step_ms(),
            executor_task_ms: default_executor_task_ms(),
        }
    }
}

impl Timing {
    /// No artificial delays. Used by tests.
    pub fn instant() -> Self {
        Self {
            planner_think_ms: 0,
            executor_step_ms: 0,
            executor_task_ms: 0,
        }
    }
}

/// What the executor does when a subtask fails.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Mark the subtask failed and keep going.
    #[default]
    Continue,
    /// Stop at the failing subtask.
    Abort,
}

/// Executor configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// History display configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HistoryConfig {
    #[serde(default = "default_history_limit")]
    pub default_limit: i64,
}

fn default_history_limit() -> i64 {
    10
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_history_limit(),
        }
    }
}

/// Demo scenario configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DemoConfig {
    /// Seconds to let agents work after each scenario submission.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Pause between scenarios when running all of them.
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,
}

fn default_settle_secs() -> u64 {
    8
}

fn default_pause_secs() -> u64 {
    2
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle_secs(),
            pause_secs: default_pause_secs(),
        }
    }
}

/// Output format of the log file.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration. `RUST_LOG` overrides `filter` when set.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Mirror events to stderr.
    #[serde(default = "default_true")]
    pub console: bool,
    #[serde(default)]
    pub file_format: LogFormat,
}

fn default_log_filter() -> String {
    "info,agentrelay=debug".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            console: true,
            file_format: LogFormat::default(),
        }
    }
}

/// agentrelay settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub roles: Roles,

    #[serde(default)]
    pub timing: Timing,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub demo: DemoConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Settings {
    /// Default roles with no simulated delays.
    pub fn instant() -> Self {
        Self {
            timing: Timing::instant(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&temp_dir.path().join("settings.json")).unwrap();

        assert_eq!(settings.roles, Roles::default());
        assert_eq!(settings.timing.planner_think_ms, 1000);
        assert_eq!(settings.executor.failure_policy, FailurePolicy::Continue);
        assert_eq!(settings.history.default_limit, 10);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"roles": {"planner": "Brain"}, "executor": {"failure_policy": "abort"}}"#,
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.roles.planner, "Brain");
        assert_eq!(settings.roles.executor, "Executor");
        assert_eq!(settings.executor.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_duplicate_role_names_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"roles": {"executor": "Planner"}}"#).unwrap();

        let err = load_settings_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_logging_section() {
        assert_eq!(Settings::default().logging.filter, "info,agentrelay=debug");
        assert!(Settings::default().logging.console);

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"logging": {"console": false, "file_format": "json"}}"#,
        )
        .unwrap();

        let logging = load_settings_from(&path).unwrap().logging;
        assert!(!logging.console);
        assert_eq!(logging.file_format, LogFormat::Json);
        assert_eq!(logging.filter, "info,agentrelay=debug");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(load_settings_from(&path), Err(Error::Config(_))));
    }
}
