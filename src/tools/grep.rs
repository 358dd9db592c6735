use super::common::{
    WalkGuard, WalkToken, glob_to_regex, is_skipped_entry, optional_str, relative_display,
    required_str,
};
use super::traits::{Tool, ToolFuture};
use super::types::{ToolContext, ToolPayload};
use regex::{Regex, RegexBuilder};
use serde_json::{Value, json};
use std::path::Path;
use walkdir::WalkDir;

const MAX_GREP_MATCHES: usize = 200;
const MAX_SEARCHED_FILE_BYTES: u64 = 2 * 1024 * 1024;
const MAX_LINE_CHARS: usize = 300;

/// Regex search over file contents.
pub struct GrepTool;

impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression; returns path:line:text matches"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Regular expression"},
                "path": {"type": "string", "description": "File or directory to search (default: workspace)"},
                "file_glob": {"type": "string", "description": "Only search files matching this glob, e.g. *.rs"},
                "case_insensitive": {"type": "boolean"}
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let pattern = required_str(&args, "pattern")?;
            let case_insensitive = args
                .get("case_insensitive")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| anyhow::anyhow!("invalid regex: {e}"))?;
            let file_filter = optional_str(&args, "file_glob")
                .map(|g| glob_to_regex(g).map(|re| (re, g.contains('/'))))
                .transpose()?;
            let root = optional_str(&args, "path")
                .map_or_else(|| ctx.workspace_dir.clone(), |p| ctx.resolve(p));
            if !root.exists() {
                anyhow::bail!("path not found: {}", root.display());
            }

            let guard = WalkGuard::new();
            let token = guard.token();
            let (hits, truncated) = tokio::task::spawn_blocking(move || {
                search_tree(&root, &regex, file_filter.as_ref(), &token)
            })
            .await?;
            drop(guard);

            if hits.is_empty() {
                return Ok(ToolPayload::Text("No matches found".to_string()));
            }
            let mut out = hits.join("\n");
            if truncated {
                out.push_str(&format!("\n... [stopped after {MAX_GREP_MATCHES} matches]"));
            }
            Ok(ToolPayload::Text(out))
        })
    }
}

/// Walks `root` collecting `path:line:text` hits; true once the cap is hit.
fn search_tree(
    root: &Path,
    regex: &Regex,
    file_filter: Option<&(Regex, bool)>,
    stop: &WalkToken,
) -> (Vec<String>, bool) {
    let mut hits = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !stop.is_stopped() && !is_skipped_entry(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let rel = if entry.depth() == 0 {
            entry.file_name().to_string_lossy().into_owned()
        } else {
            relative_display(root, entry.path())
        };
        if let Some((filter, full_path)) = file_filter {
            let subject = if *full_path {
                rel.as_str()
            } else {
                rel.rsplit('/').next().unwrap_or(&rel)
            };
            if !filter.is_match(subject) {
                continue;
            }
        }
        if search_file(entry.path(), &rel, regex, &mut hits) {
            return (hits, true);
        }
    }
    (hits, false)
}

/// Appends matches from one file; returns true once the match cap is hit.
fn search_file(path: &Path, rel: &str, regex: &Regex, hits: &mut Vec<String>) -> bool {
    let too_big = std::fs::metadata(path).is_ok_and(|m| m.len() > MAX_SEARCHED_FILE_BYTES);
    if too_big {
        return false;
    }
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    for (number, line) in content.lines().enumerate() {
        if regex.is_match(line) {
            if hits.len() == MAX_GREP_MATCHES {
                return true;
            }
            let line = crate::utils::truncate_with_ellipsis(line.trim_end(), MAX_LINE_CHARS);
            hits.push(format!("{rel}:{}:{line}", number + 1));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(
            tmp.path().join("src/lib.rs"),
            "fn main() {}\nfn helper() {}\n",
        )
        .unwrap();
        std::fs::write(tmp.path().join("notes.md"), "Main idea\n").unwrap();
        tmp
    }

    #[tokio::test]
    async fn finds_matches_with_line_numbers() {
        let tmp = workspace();
        let ctx = ToolContext::new(tmp.path());

        let out = GrepTool
            .execute(json!({"pattern": "fn \\w+"}), &ctx)
            .await
            .unwrap()
            .render();

        assert!(out.contains("src/lib.rs:1:fn main() {}"));
        assert!(out.contains("src/lib.rs:2:fn helper() {}"));
    }

    #[tokio::test]
    async fn file_glob_and_case_flag() {
        let tmp = workspace();
        let ctx = ToolContext::new(tmp.path());

        let out = GrepTool
            .execute(
                json!({"pattern": "main", "file_glob": "*.md", "case_insensitive": true}),
                &ctx,
            )
            .await
            .unwrap()
            .render();

        assert_eq!(out, "notes.md:1:Main idea");
    }

    #[tokio::test]
    async fn invalid_regex_is_an_error() {
        let tmp = workspace();
        let ctx = ToolContext::new(tmp.path());

        let err = GrepTool
            .execute(json!({"pattern": "("}), &ctx)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("invalid regex"));
    }

    #[tokio::test]
    async fn single_file_path_is_searched() {
        let tmp = workspace();
        let ctx = ToolContext::new(tmp.path());

        let out = GrepTool
            .execute(json!({"pattern": "helper", "path": "src/lib.rs"}), &ctx)
            .await
            .unwrap()
            .render();

        assert_eq!(out, "lib.rs:2:fn helper() {}");
    }

    #[test]
    fn walk_stops_once_the_call_is_abandoned() {
        let tmp = workspace();
        let regex = Regex::new("fn").unwrap();
        let guard = WalkGuard::new();
        let token = guard.token();
        drop(guard);

        let (hits, truncated) = search_tree(tmp.path(), &regex, None, &token);

        assert!(hits.is_empty());
        assert!(!truncated);
    }
}
