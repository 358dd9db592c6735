use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_status_path() -> String {
    "status.json".into()
}

fn default_manifest() -> String {
    "features.toml".into()
}

fn default_run_log() -> String {
    "runs.jsonl".into()
}

fn default_log_process() -> String {
    "coordinator".into()
}

fn default_cycle_interval_secs() -> u64 {
    600
}

fn default_max_parallel() -> usize {
    2
}

fn default_task_timeout_secs() -> u64 {
    600
}

fn default_dashboard_host() -> String {
    "127.0.0.1".into()
}

fn default_dashboard_port() -> u16 {
    8700
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Snapshot file shared between the coordinator and its readers.
    #[serde(default = "default_status_path")]
    pub path: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            path: default_status_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Feature manifest, relative to the workspace.
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// Backend profile used for headless runs; falls back to the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// Append-only JSON-lines record of every headless run.
    #[serde(default = "default_run_log")]
    pub run_log: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            cycle_interval_secs: default_cycle_interval_secs(),
            max_parallel: default_max_parallel(),
            task_timeout_secs: default_task_timeout_secs(),
            backend: None,
            run_log: default_run_log(),
        }
    }
}

impl CoordinatorConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_host")]
    pub host: String,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    /// Guarded process targeted by `/api/logs` and `/api/restart` when the
    /// request names none.
    #[serde(default = "default_log_process")]
    pub log_process: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_dashboard_host(),
            port: default_dashboard_port(),
            log_process: default_log_process(),
        }
    }
}
