use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

fn default_timeout_secs() -> u64 {
    30
}

fn default_shell_timeout_secs() -> u64 {
    120
}

fn default_max_output_bytes() -> usize {
    262_144
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-call deadline for every tool without a more specific setting.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Default deadline for the `bash` tool.
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
    /// Text payloads above this size are truncated before reaching the model.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Per-tool deadline overrides, keyed by tool name.
    #[serde(default)]
    pub timeouts: HashMap<String, u64>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            shell_timeout_secs: default_shell_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            timeouts: HashMap::new(),
        }
    }
}

impl ToolsConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs.max(1))
    }

    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs.max(1))
    }

    pub fn timeout_override(&self, tool: &str) -> Option<Duration> {
        self.timeouts
            .get(tool)
            .map(|secs| Duration::from_secs((*secs).max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_are_looked_up_by_name() {
        let parsed: ToolsConfig = toml::from_str(
            r"
            default_timeout_secs = 5
            [timeouts]
            grep = 60
            ",
        )
        .unwrap();
        assert_eq!(parsed.default_timeout(), Duration::from_secs(5));
        assert_eq!(parsed.timeout_override("grep"), Some(Duration::from_secs(60)));
        assert_eq!(parsed.timeout_override("read"), None);
        assert_eq!(parsed.shell_timeout(), Duration::from_secs(120));
    }
}
