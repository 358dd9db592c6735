use super::common::{required_str, workspace_path_property};
use super::traits::{Tool, ToolFuture};
use super::types::{ToolContext, ToolPayload};
use anyhow::Context;
use serde_json::{Value, json};

/// Replace the first occurrence of a text fragment in a file.
pub struct FileEditTool;

impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "edit"
    }

    fn description(&self) -> &str {
        "Replace the first occurrence of old_text with new_text in a file"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": workspace_path_property(),
                "old_text": {"type": "string", "description": "Exact text to find"},
                "new_text": {"type": "string", "description": "Replacement text"}
            },
            "required": ["path", "old_text", "new_text"],
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let raw = required_str(&args, "path")?;
            let old_text = required_str(&args, "old_text")?;
            let new_text = required_str(&args, "new_text")?;
            if old_text.is_empty() {
                anyhow::bail!("old_text cannot be empty");
            }

            let path = ctx.resolve(raw);
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    anyhow::bail!("file not found: {raw}");
                }
                Err(e) => return Err(e).with_context(|| format!("failed to read {raw}")),
            };

            let Some(at) = content.find(old_text) else {
                anyhow::bail!("text not found in {raw}");
            };
            let mut updated = String::with_capacity(content.len() + new_text.len());
            updated.push_str(&content[..at]);
            updated.push_str(new_text);
            updated.push_str(&content[at + old_text.len()..]);

            tokio::fs::write(&path, updated)
                .await
                .with_context(|| format!("failed to write {raw}"))?;

            let line = content[..at].lines().count().max(1);
            Ok(ToolPayload::Text(format!("Edited {raw} at line {line}")))
        })
    }
}
