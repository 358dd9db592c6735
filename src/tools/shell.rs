use super::common::required_str;
use super::traits::{Tool, ToolFuture};
use super::types::{ToolContext, ToolPayload};
use crate::utils::clip_to_bytes;
use serde_json::{Value, json};
use std::process::Stdio;
use std::time::Duration;

/// Per-stream output cap before the size middleware sees the result (1 MB).
const MAX_STREAM_BYTES: usize = 1_048_576;
/// Longest deadline a call may request through its `timeout` argument.
const MAX_REQUESTED_TIMEOUT_SECS: u64 = 600;
/// Environment variables passed through to commands.
/// Only functional variables are included -- never API keys or secrets.
const SAFE_ENV_VARS: &[&str] = &[
    "PATH", "HOME", "TERM", "LANG", "LC_ALL", "LC_CTYPE", "USER", "SHELL", "TMPDIR",
];

/// Run a command through `sh -c` in the workspace directory.
pub struct ShellTool {
    default_timeout: Duration,
}

impl ShellTool {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl Tool for ShellTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace; returns exit code, stdout and stderr"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to execute"},
                "timeout": {"type": "integer", "description": "Seconds before the command is killed"}
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn call_timeout(&self, args: &Value) -> Option<Duration> {
        let requested = args
            .get("timeout")
            .and_then(Value::as_u64)
            .map(|secs| Duration::from_secs(secs.clamp(1, MAX_REQUESTED_TIMEOUT_SECS)));
        Some(requested.unwrap_or(self.default_timeout))
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let command = required_str(&args, "command")?;
            let output = run_shell(command, ctx).await?;
            Ok(ToolPayload::Text(output.render()))
        })
    }
}

/// Captured result of one shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn render(&self) -> String {
        let code = self
            .exit_code
            .map_or_else(|| "killed by signal".to_string(), |c| c.to_string());
        let mut out = format!("exit code: {code}\n");
        if !self.stdout.is_empty() {
            out.push_str("--- stdout ---\n");
            out.push_str(&self.stdout);
            if !self.stdout.ends_with('\n') {
                out.push('\n');
            }
        }
        if !self.stderr.is_empty() {
            out.push_str("--- stderr ---\n");
            out.push_str(&self.stderr);
        }
        out
    }
}

fn capped(bytes: &[u8], label: &str) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_STREAM_BYTES {
        return text.into_owned();
    }
    let mut clipped = clip_to_bytes(&text, MAX_STREAM_BYTES).to_string();
    clipped.push_str(&format!("\n... [{label} truncated at 1MB]"));
    clipped
}

/// Run `command` with a scrubbed environment. The child is killed if the
/// returned future is dropped (e.g. by the registry's deadline).
pub async fn run_shell(command: &str, ctx: &ToolContext) -> anyhow::Result<ShellOutput> {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(&ctx.workspace_dir)
        .env_clear()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for var in SAFE_ENV_VARS {
        if let Ok(val) = std::env::var(var) {
            cmd.env(var, val);
        }
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("failed to execute command: {e}"))?;

    Ok(ShellOutput {
        exit_code: output.status.code(),
        stdout: capped(&output.stdout, "stdout"),
        stderr: capped(&output.stderr, "stderr"),
    })
}
