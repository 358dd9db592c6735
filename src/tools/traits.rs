use super::types::{ToolContext, ToolPayload, ToolResult, ToolSpec};
use crate::error::ToolError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<ToolPayload>> + Send + 'a>>;

/// A capability the model can invoke by name.
pub trait Tool: Send + Sync {
    /// Tool name (used in the tool-call protocol)
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Deadline for this particular call, when the tool knows better than
    /// the registry default.
    fn call_timeout(&self, _args: &Value) -> Option<Duration> {
        None
    }

    /// Execute the tool with already-validated arguments
    fn execute<'a>(&'a self, args: Value, ctx: &'a ToolContext) -> ToolFuture<'a>;

    /// Drop any state kept for `session_id`.
    fn end_session(&self, _session_id: &str) {}

    /// Get the full spec for prompt and request registration
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Hooks wrapped around every registry execution.
pub trait ToolMiddleware: Send + Sync {
    fn before_execute<'a>(
        &'a self,
        tool_name: &'a str,
        args: &'a Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

    fn after_execute<'a>(
        &'a self,
        tool_name: &'a str,
        outcome: &'a mut Result<ToolResult, ToolError>,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}
