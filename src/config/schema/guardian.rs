use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

fn default_check_interval_secs() -> u64 {
    60
}

fn default_state_file() -> String {
    "guardian_state.json".into()
}

fn default_alert_file() -> String {
    "guardian_alerts.jsonl".into()
}

fn default_restart_dir() -> String {
    "restart_requests".into()
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_secs() -> u64 {
    5
}

fn default_backoff_cap_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// Seconds between liveness checks of every guarded process.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    /// Append-only JSON-lines file receiving exhausted-supervision alerts.
    #[serde(default = "default_alert_file")]
    pub alert_file: String,
    /// Directory polled for restart requests, one `<name>.restart` file each.
    #[serde(default = "default_restart_dir")]
    pub restart_dir: String,
    #[serde(default = "GuardedProcessConfig::default_fleet")]
    pub processes: Vec<GuardedProcessConfig>,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            state_file: default_state_file(),
            alert_file: default_alert_file(),
            restart_dir: default_restart_dir(),
            processes: GuardedProcessConfig::default_fleet(),
        }
    }
}

impl GuardianConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut names: HashSet<&str> = HashSet::new();
        for process in &self.processes {
            if process.name.trim().is_empty() {
                errors.push("guarded process name cannot be empty".to_string());
            }
            if !names.insert(process.name.as_str()) {
                errors.push(format!("duplicate guarded process: {}", process.name));
            }
            if process.command.trim().is_empty() {
                errors.push(format!("process '{}': command cannot be empty", process.name));
            }
            if process.restart.backoff_base_secs > process.restart.backoff_cap_secs {
                errors.push(format!(
                    "process '{}': backoff_base_secs must not exceed backoff_cap_secs",
                    process.name
                ));
            }
        }
        errors
    }
}

/// One supervised child process (`[[guardian.processes]]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardedProcessConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// stdout and stderr are appended here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub restart: RestartConfig,
}

impl GuardedProcessConfig {
    pub fn default_fleet() -> Vec<Self> {
        vec![
            Self {
                name: "dashboard".into(),
                command: "camel".into(),
                args: vec!["dashboard".into()],
                cwd: None,
                log_file: Some("dashboard.log".into()),
                probe: ProbeConfig::Http {
                    url: "http://127.0.0.1:8700/api/health".into(),
                },
                restart: RestartConfig::default(),
            },
            Self {
                name: "coordinator".into(),
                command: "camel".into(),
                args: vec!["coordinator".into()],
                cwd: None,
                log_file: Some("coordinator.log".into()),
                probe: ProbeConfig::Heartbeat {
                    path: "status.json".into(),
                    max_age_secs: 900,
                },
                restart: RestartConfig::default(),
            },
        ]
    }
}

/// Liveness probe run in addition to the process-exists check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeConfig {
    #[default]
    None,
    /// GET must answer 2xx.
    Http { url: String },
    /// TCP connect must succeed.
    Tcp { addr: String },
    /// File must have been modified within `max_age_secs`.
    Heartbeat { path: String, max_age_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
        }
    }
}
