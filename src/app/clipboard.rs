use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

pub const FALLBACK_CLIPBOARD_FILE: &str = "/tmp/camel_clipboard.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardTarget {
    Program(&'static str),
    File(PathBuf),
}

impl std::fmt::Display for ClipboardTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Program(name) => write!(f, "clipboard ({name})"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

const PROGRAMS: &[(&str, &[&str])] = &[
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Copy via `xclip`, then `xsel`, then a temp file.
pub async fn copy_text(text: &str) -> Result<ClipboardTarget> {
    for &(program, args) in PROGRAMS {
        match pipe_to(program, args, text).await {
            Ok(()) => return Ok(ClipboardTarget::Program(program)),
            Err(error) => tracing::debug!(program, "clipboard program unavailable: {error:#}"),
        }
    }
    let path = PathBuf::from(FALLBACK_CLIPBOARD_FILE);
    copy_to_file(&path, text).await?;
    Ok(ClipboardTarget::File(path))
}

async fn pipe_to(program: &str, args: &[&str], text: &str) -> Result<()> {
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawn {program}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await?;
        stdin.shutdown().await?;
    }
    let status = child.wait().await?;
    anyhow::ensure!(status.success(), "{program} exited with {status}");
    Ok(())
}

pub async fn copy_to_file(path: &std::path::Path, text: &str) -> Result<()> {
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}
