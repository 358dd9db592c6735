//! Restart requests left for the supervisors by other processes.
//!
//! A request is a `<name>.restart` file in the request directory. The
//! supervisor of `name` removes it at its next health check and restarts the
//! child without counting a failure.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RestartRequests {
    dir: PathBuf,
}

impl RestartRequests {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, process: &str) -> PathBuf {
        self.dir.join(format!("{process}.restart"))
    }

    /// Leave a request for `process`; repeated requests collapse into one.
    pub async fn request(&self, process: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path_for(process);
        tokio::fs::write(&path, Utc::now().to_rfc3339())
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub async fn is_pending(&self, process: &str) -> bool {
        tokio::fs::try_exists(self.path_for(process))
            .await
            .unwrap_or(false)
    }

    /// Consume a pending request. Returns whether one was present.
    pub async fn take(&self, process: &str) -> bool {
        let path = self.path_for(process);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => false,
            Err(error) => {
                tracing::warn!(process, path = %path.display(), "cannot consume restart request: {error}");
                false
            }
        }
    }
}
