use super::common::{required_str, workspace_path_property};
use super::traits::{Tool, ToolFuture};
use super::types::{ToolContext, ToolPayload};
use anyhow::Context;
use serde_json::{Value, json};

/// Create or overwrite a file, creating parent directories as needed.
pub struct FileWriteTool;

impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write"
    }

    fn description(&self) -> &str {
        "Write content to a file, replacing it if it exists"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": workspace_path_property(),
                "content": {"type": "string", "description": "Full new file content"}
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let raw = required_str(&args, "path")?;
            let content = required_str(&args, "content")?;
            let path = ctx.resolve(raw);

            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("cannot create parent directory for {raw}"))?;
            }
            tokio::fs::write(&path, content)
                .await
                .with_context(|| format!("failed to write {raw}"))?;

            Ok(ToolPayload::Text(format!(
                "Wrote {} bytes to {raw}",
                content.len()
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_and_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let ctx = ToolContext::new(tmp.path());

        let out = FileWriteTool
            .execute(json!({"path": "deep/dir/notes.md", "content": "hello"}), &ctx)
            .await
            .unwrap();

        assert_eq!(out.render(), "Wrote 5 bytes to deep/dir/notes.md");
        let written = std::fs::read_to_string(tmp.path().join("deep/dir/notes.md")).unwrap();
        assert_eq!(written, "hello");
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "old").unwrap();
        let ctx = ToolContext::new(tmp.path());

        FileWriteTool
            .execute(json!({"path": "a.txt", "content": "new"}), &ctx)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "new");
    }
}
