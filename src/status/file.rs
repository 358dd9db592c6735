use super::feed::{StatusPublisher, StatusSnapshot};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Write `snapshot` next to `path` and rename it into place, so readers see
/// either the old or the new file, never a partial one.
pub async fn write_snapshot_atomic(path: &Path, snapshot: &StatusSnapshot) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

pub async fn read_snapshot(path: &Path) -> Result<StatusSnapshot> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("malformed {}", path.display()))
}

/// Polls a snapshot file and republishes changes into a local feed.
pub struct StatusFileWatcher {
    path: PathBuf,
    interval: Duration,
}

impl StatusFileWatcher {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }

    /// One poll: publish the file's snapshot if it parses and differs.
    /// Missing or unreadable files keep the previous value.
    pub async fn poll_once(&self, publisher: &StatusPublisher) -> bool {
        match read_snapshot(&self.path).await {
            Ok(snapshot) => {
                if *publisher.reader().latest() == snapshot {
                    return false;
                }
                publisher.publish(snapshot);
                true
            }
            Err(error) => {
                tracing::debug!(path = %self.path.display(), "status file not readable: {error:#}");
                false
            }
        }
    }

    pub fn spawn(self, publisher: StatusPublisher, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.poll_once(&publisher).await;
                    }
                }
            }
        })
    }
}
