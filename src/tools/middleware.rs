pub use super::traits::ToolMiddleware;
use super::types::{ToolContext, ToolPayload, ToolResult};
use crate::error::ToolError;
use crate::utils::clip_to_bytes;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

// ── AuditMiddleware ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct AuditMiddleware;

impl ToolMiddleware for AuditMiddleware {
    fn before_execute<'a>(
        &'a self,
        tool_name: &'a str,
        _args: &'a Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(
                tool = tool_name,
                call_id = %ctx.call_id,
                round = ctx.round,
                "tool execution started"
            );
        })
    }

    fn after_execute<'a>(
        &'a self,
        tool_name: &'a str,
        outcome: &'a mut Result<ToolResult, ToolError>,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            match outcome {
                Ok(result) => tracing::info!(
                    tool = tool_name,
                    call_id = %ctx.call_id,
                    round = ctx.round,
                    duration_ms = u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
                    "tool execution finished"
                ),
                Err(error) => tracing::warn!(
                    tool = tool_name,
                    call_id = %ctx.call_id,
                    round = ctx.round,
                    kind = error.kind(),
                    "tool execution failed: {error}"
                ),
            }
        })
    }
}

// ── OutputSizeLimitMiddleware ───────────────────────────────────────

const MAX_TOOL_OUTPUT_LINES: usize = 4_000;

#[derive(Debug)]
pub struct OutputSizeLimitMiddleware {
    max_bytes: usize,
}

impl OutputSizeLimitMiddleware {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes: max_bytes.max(1024),
        }
    }

    fn limit(&self, tool_name: &str, text: &mut String) {
        let original_bytes = text.len();
        let original_lines = text.lines().count();
        if original_bytes <= self.max_bytes && original_lines <= MAX_TOOL_OUTPUT_LINES {
            return;
        }

        let mut output = if original_lines > MAX_TOOL_OUTPUT_LINES {
            text.lines()
                .take(MAX_TOOL_OUTPUT_LINES)
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            std::mem::take(text)
        };
        let clipped_len = clip_to_bytes(&output, self.max_bytes).len();
        output.truncate(clipped_len);
        output.push_str(&format!(
            "\n... [output truncated: {original_bytes} bytes/{original_lines} lines \u{2192} {} bytes/{MAX_TOOL_OUTPUT_LINES} lines max]",
            self.max_bytes
        ));

        tracing::warn!(
            tool = tool_name,
            original_bytes,
            original_lines,
            max_bytes = self.max_bytes,
            "tool output truncated due to size limits"
        );
        *text = output;
    }
}

impl ToolMiddleware for OutputSizeLimitMiddleware {
    fn before_execute<'a>(
        &'a self,
        _tool_name: &'a str,
        _args: &'a Value,
        _ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }

    fn after_execute<'a>(
        &'a self,
        tool_name: &'a str,
        outcome: &'a mut Result<ToolResult, ToolError>,
        _ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if let Ok(ToolResult {
                payload: ToolPayload::Text(text),
                ..
            }) = outcome
            {
                self.limit(tool_name, text);
            }
        })
    }
}

pub fn default_middleware_chain(max_output_bytes: usize) -> Vec<Arc<dyn ToolMiddleware>> {
    vec![
        Arc::new(OutputSizeLimitMiddleware::new(max_output_bytes)),
        Arc::new(AuditMiddleware),
    ]
}
