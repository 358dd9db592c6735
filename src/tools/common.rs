use regex::Regex;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Directories never descended into by the search tools.
pub(crate) const SKIP_DIRS: &[&str] = &["target", "node_modules", "__pycache__", ".git", "venv"];

pub(crate) fn workspace_path_property() -> Value {
    json!({
        "type": "string",
        "description": "File path, relative to the workspace unless absolute"
    })
}

pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing '{key}' parameter"))
}

pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub(crate) fn optional_usize(args: &Value, key: &str) -> Option<usize> {
    args.get(key)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

pub(crate) fn is_skipped_entry(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_str().unwrap_or("");
    SKIP_DIRS.contains(&name) || (name.starts_with('.') && entry.file_type().is_dir())
}

/// Path of `path` relative to `root`, with `/` separators.
pub(crate) fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Translate a shell glob (`*`, `**`, `?`, `[..]`, `{a,b}`) into an anchored regex.
/// Owned by a tool future; dropping it (call finished or timed out) stops
/// the blocking directory walk holding the matching [`WalkToken`].
pub(crate) struct WalkGuard {
    stop: Arc<AtomicBool>,
}

impl WalkGuard {
    pub(crate) fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn token(&self) -> WalkToken {
        WalkToken {
            stop: Arc::clone(&self.stop),
        }
    }
}

impl Drop for WalkGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

#[derive(Clone)]
pub(crate) struct WalkToken {
    stop: Arc<AtomicBool>,
}

impl WalkToken {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

pub(crate) fn glob_to_regex(pattern: &str) -> anyhow::Result<Regex> {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    let mut in_braces = false;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..].iter().position(|&ch| ch == ']');
                if let Some(offset) = close {
                    let class: String = chars[i + 1..i + 1 + offset].iter().collect();
                    let class = class.strip_prefix('!').map_or(class.clone(), |rest| {
                        format!("^{rest}")
                    });
                    out.push('[');
                    out.push_str(&class);
                    out.push(']');
                    i += offset + 2;
                    continue;
                }
                out.push_str("\\[");
            }
            '{' => {
                in_braces = true;
                out.push_str("(?:");
            }
            '}' if in_braces => {
                in_braces = false;
                out.push(')');
            }
            ',' if in_braces => out.push('|'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }
    out.push('$');

    Regex::new(&out).map_err(|e| anyhow::anyhow!("invalid glob pattern '{pattern}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_walk_guard_stops_token() {
        let guard = WalkGuard::new();
        let token = guard.token();
        assert!(!token.is_stopped());
        drop(guard);
        assert!(token.is_stopped());
    }

    #[test]
    fn star_stays_within_one_segment() {
        let re = glob_to_regex("*.rs").unwrap();
        assert!(re.is_match("main.rs"));
        assert!(!re.is_match("src/main.rs"));
    }

    #[test]
    fn double_star_crosses_directories() {
        let re = glob_to_regex("**/*.rs").unwrap();
        assert!(re.is_match("main.rs"));
        assert!(re.is_match("src/tools/grep.rs"));
        assert!(!re.is_match("src/tools/grep.py"));
    }

    #[test]
    fn braces_and_classes() {
        let re = glob_to_regex("src/*.{rs,toml}").unwrap();
        assert!(re.is_match("src/lib.rs"));
        assert!(re.is_match("src/Cargo.toml"));
        assert!(!re.is_match("src/lib.py"));

        let re = glob_to_regex("log[0-9].txt").unwrap();
        assert!(re.is_match("log3.txt"));
        assert!(!re.is_match("logx.txt"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let re = glob_to_regex("a+b.txt").unwrap();
        assert!(re.is_match("a+b.txt"));
        assert!(!re.is_match("aab.txt"));
    }
}
