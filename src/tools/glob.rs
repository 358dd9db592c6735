use super::common::{
    WalkGuard, WalkToken, glob_to_regex, is_skipped_entry, optional_str, relative_display,
    required_str,
};
use super::traits::{Tool, ToolFuture};
use super::types::{ToolContext, ToolPayload};
use regex::Regex;
use serde_json::{Value, json};
use std::path::Path;
use walkdir::WalkDir;

const MAX_GLOB_RESULTS: usize = 500;

/// List files whose workspace-relative path matches a glob.
pub struct GlobTool;

impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files by glob pattern such as **/*.rs (hidden and build directories are skipped)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Glob pattern, e.g. src/**/*.rs"},
                "path": {"type": "string", "description": "Directory to search from (default: workspace)"}
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let pattern = required_str(&args, "pattern")?.to_string();
            let root = optional_str(&args, "path")
                .map_or_else(|| ctx.workspace_dir.clone(), |p| ctx.resolve(p));
            if !root.is_dir() {
                anyhow::bail!("not a directory: {}", root.display());
            }
            let matcher = glob_to_regex(&pattern)?;

            let guard = WalkGuard::new();
            let token = guard.token();
            let (matches, truncated) =
                tokio::task::spawn_blocking(move || collect_matches(&root, &matcher, &token))
                    .await?;
            drop(guard);

            if matches.is_empty() {
                return Ok(ToolPayload::Text(format!("No files match {pattern}")));
            }
            let mut out = matches.join("\n");
            if truncated {
                out.push_str(&format!("\n... [stopped after {MAX_GLOB_RESULTS} matches]"));
            }
            Ok(ToolPayload::Text(out))
        })
    }
}

/// Workspace-relative paths under `root` matching `matcher`, sorted.
fn collect_matches(root: &Path, matcher: &Regex, stop: &WalkToken) -> (Vec<String>, bool) {
    let mut matches = Vec::new();
    let mut truncated = false;
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !stop.is_stopped() && !is_skipped_entry(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let rel = relative_display(root, entry.path());
        if matcher.is_match(&rel) {
            if matches.len() == MAX_GLOB_RESULTS {
                truncated = true;
                break;
            }
            matches.push(rel);
        }
    }
    matches.sort();
    (matches, truncated)
}
