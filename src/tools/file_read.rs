use super::common::{optional_usize, required_str, workspace_path_property};
use super::traits::{Tool, ToolFuture};
use super::types::{ToolContext, ToolPayload};
use anyhow::Context;
use serde_json::{Value, json};

/// Maximum file size accepted by `read` (10 MB).
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_LINE_LIMIT: usize = 2_000;

/// Read a file, optionally a window of lines, with line numbers.
pub struct FileReadTool;

impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read"
    }

    fn description(&self) -> &str {
        "Read a text file. Use offset (1-based line) and limit to page through large files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": workspace_path_property(),
                "offset": {"type": "integer", "description": "First line to return (1-based)"},
                "limit": {"type": "integer", "description": "Maximum number of lines"}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let raw = required_str(&args, "path")?;
            let path = ctx.resolve(raw);

            let meta = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    anyhow::bail!("file not found: {raw}");
                }
                Err(e) => return Err(e).with_context(|| format!("cannot stat {raw}")),
            };
            if meta.is_dir() {
                anyhow::bail!("{raw} is a directory");
            }
            if meta.len() > MAX_FILE_SIZE {
                anyhow::bail!(
                    "file too large: {} bytes (limit {MAX_FILE_SIZE} bytes)",
                    meta.len()
                );
            }

            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {raw}"))?;
            let text = String::from_utf8(bytes)
                .map_err(|_| anyhow::anyhow!("{raw} is not valid UTF-8 text"))?;

            let offset = optional_usize(&args, "offset").unwrap_or(1).max(1);
            let limit = optional_usize(&args, "limit").unwrap_or(DEFAULT_LINE_LIMIT);
            let total = text.lines().count();

            let mut out = String::new();
            for (number, line) in text.lines().enumerate().skip(offset - 1).take(limit) {
                out.push_str(&format!("{:>6}\t{line}\n", number + 1));
            }
            let shown_end = (offset - 1).saturating_add(limit).min(total);
            if shown_end < total {
                out.push_str(&format!(
                    "... [{} more lines; continue with offset={}]\n",
                    total - shown_end,
                    shown_end + 1
                ));
            }
            if out.is_empty() {
                out = if total == 0 {
                    "(empty file)".to_string()
                } else {
                    format!("(offset {offset} is past the end; file has {total} lines)")
                };
            }
            Ok(ToolPayload::Text(out))
        })
    }
}
