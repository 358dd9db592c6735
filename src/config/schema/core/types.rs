use super::super::{
    BackendConfig, CoordinatorConfig, DashboardConfig, GuardianConfig, StatusConfig, ToolsConfig,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on model↔tool round-trips per user request.
pub const TURN_BUDGET_HARD_CAP: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml and runtime files - computed, not serialized
    #[serde(skip)]
    pub camel_dir: PathBuf,
    /// Path to config.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Resolved workspace directory - computed from `workspace`, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,

    /// Workspace root for file tools. Defaults to the launch directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,

    /// Name of the backend profile activated at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<String>,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default = "BackendConfig::default_profiles")]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub guardian: GuardianConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camel_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            workspace_dir: PathBuf::new(),
            workspace: None,
            default_backend: None,
            agent: AgentConfig::default(),
            backends: BackendConfig::default_profiles(),
            tools: ToolsConfig::default(),
            guardian: GuardianConfig::default(),
            status: StatusConfig::default(),
            coordinator: CoordinatorConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Config {
    /// Expand `~` in a configured path. Relative paths resolve against the
    /// config directory so runtime files stay together.
    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
        if expanded.is_absolute() || self.camel_dir.as_os_str().is_empty() {
            expanded
        } else {
            self.camel_dir.join(expanded)
        }
    }

    pub fn status_path(&self) -> PathBuf {
        self.resolve_path(&self.status.path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model↔tool round-trips per user request.
    #[serde(default = "default_turn_budget")]
    pub turn_budget: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Overall deadline for one streamed model response.
    #[serde(default = "default_stream_timeout_secs")]
    pub stream_timeout_secs: u64,
    /// Longest allowed silence between two streamed chunks.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Committed turns sent with each request; 0 sends everything.
    #[serde(default)]
    pub history_limit: usize,
}

fn default_turn_budget() -> u32 {
    10
}

fn default_temperature() -> f64 {
    0.7
}

fn default_stream_timeout_secs() -> u64 {
    300
}

fn default_idle_timeout_secs() -> u64 {
    90
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            turn_budget: default_turn_budget(),
            temperature: default_temperature(),
            stream_timeout_secs: default_stream_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            system_prompt: None,
            history_limit: 0,
        }
    }
}

impl AgentConfig {
    pub fn effective_turn_budget(&self) -> u32 {
        self.turn_budget.clamp(1, TURN_BUDGET_HARD_CAP)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs.max(1))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.max(1))
    }
}
