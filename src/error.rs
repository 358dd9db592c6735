use std::time::Duration;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `camel`.
///
/// Each subsystem defines its own error enum. Callers match on these at the
/// seams where recovery differs (tool dispatch, backend switching, guardian
/// supervision); internal plumbing keeps using `anyhow::Result` with context.
#[derive(Debug, Error)]
pub enum CamelError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Backend ─────────────────────────────────────────────────────────
    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    // ── Tools ───────────────────────────────────────────────────────────
    #[error("tool: {0}")]
    Tool(#[from] ToolError),

    // ── Guardian ────────────────────────────────────────────────────────
    #[error("guardian: {0}")]
    Guardian(#[from] GuardianError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Backend errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unknown backend profile: {0}")]
    UnknownProfile(String),

    #[error("backend {profile} request failed: {message}")]
    Request { profile: String, message: String },

    #[error("backend {profile} returned HTTP {status}: {body}")]
    Status {
        profile: String,
        status: u16,
        body: String,
    },

    #[error("no reachable backend among: {0}")]
    NoneReachable(String),

    #[error("cannot switch backend while a response is in flight")]
    Busy,
}

// ─── Tool errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool {name} is already registered")]
    DuplicateTool { name: String },

    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("tool {name} timed out after {}s", .after.as_secs())]
    ExecutionTimeout { name: String, after: Duration },

    #[error("tool {name} failed: {message}")]
    ExecutionError { name: String, message: String },
}

impl ToolError {
    /// Short machine-readable kind, surfaced to the model in tool-error turns.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateTool { .. } => "duplicate_tool",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::ExecutionTimeout { .. } => "execution_timeout",
            Self::ExecutionError { .. } => "execution_error",
        }
    }
}

// ─── Guardian errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GuardianError {
    #[error("process {name} failed to start: {message}")]
    Spawn { name: String, message: String },

    #[error("process {name} exhausted {max_retries} restart attempts")]
    SupervisionExhausted { name: String, max_retries: u32 },

    #[error("duplicate guarded process: {0}")]
    DuplicateProcess(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, CamelError>;
