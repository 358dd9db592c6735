use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Description of a tool for the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolPayload {
    Text(String),
    Structured(Value),
}

impl ToolPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Rendering placed in the `tool` turn the model reads.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

/// Outcome of one dispatched tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub status: ToolStatus,
    pub payload: ToolPayload,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, payload: ToolPayload, duration: Duration) -> Self {
        Self {
            call_id: call_id.into(),
            status: ToolStatus::Ok,
            payload,
            duration,
        }
    }

    pub fn error(call_id: impl Into<String>, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            call_id: call_id.into(),
            status: ToolStatus::Error,
            payload: ToolPayload::Text(message.into()),
            duration,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }
}

/// Per-call information handed to every tool and middleware.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub workspace_dir: PathBuf,
    /// Owning agent session; tools keeping per-conversation state key on it.
    pub session_id: String,
    pub call_id: String,
    /// Model round-trip (1-based) within the current user request.
    pub round: u32,
}

impl ToolContext {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            session_id: String::new(),
            call_id: String::new(),
            round: 0,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn for_call(&self, call_id: &str, round: u32) -> Self {
        Self {
            workspace_dir: self.workspace_dir.clone(),
            session_id: self.session_id.clone(),
            call_id: call_id.to_string(),
            round,
        }
    }

    /// Resolve a tool-supplied path against the workspace.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
        if expanded.is_absolute() {
            expanded
        } else {
            self.workspace_dir.join(expanded)
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
