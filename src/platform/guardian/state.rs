use crate::config::RestartConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(super) const STATE_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessState {
    Starting,
    Running,
    Failed,
    Stopped,
}

/// Guardian-owned record of one supervised process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardedProcess {
    pub name: String,
    pub command: String,
    pub restart: RestartConfig,
    pub state: ProcessState,
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_started_at: Option<DateTime<Utc>>,
}

impl GuardedProcess {
    pub fn new(name: impl Into<String>, command: impl Into<String>, restart: RestartConfig) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            restart,
            state: ProcessState::Starting,
            consecutive_failures: 0,
            last_started_at: None,
        }
    }

    /// No further restarts will happen for this process.
    pub fn is_terminal(&self) -> bool {
        match self.state {
            ProcessState::Stopped => true,
            ProcessState::Failed => self.consecutive_failures > self.restart.max_retries,
            ProcessState::Starting | ProcessState::Running => false,
        }
    }
}

/// Latest record per process, written by supervisors and read by everyone else.
#[derive(Debug, Clone, Default)]
pub struct ProcessBoard {
    inner: Arc<RwLock<BTreeMap<String, GuardedProcess>>>,
}

impl ProcessBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: GuardedProcess) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.name.clone(), record);
    }

    pub fn update(&self, name: &str, apply: impl FnOnce(&mut GuardedProcess)) {
        if let Some(record) = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(name)
        {
            apply(record);
        }
    }

    pub fn get(&self, name: &str) -> Option<GuardedProcess> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Records sorted by name.
    pub fn snapshot(&self) -> Vec<GuardedProcess> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianStatus {
    pub processes: Vec<GuardedProcess>,
    pub written_at: DateTime<Utc>,
}

pub async fn write_state_file(path: &Path, board: &ProcessBoard) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let status = GuardianStatus {
        processes: board.snapshot(),
        written_at: Utc::now(),
    };
    let data = serde_json::to_vec_pretty(&status)?;
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

pub async fn read_state_file(path: &Path) -> Result<GuardianStatus> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("malformed {}", path.display()))
}

pub(super) fn spawn_state_writer(
    path: PathBuf,
    board: ProcessBoard,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATE_FLUSH_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            if let Err(error) = write_state_file(&path, &board).await {
                tracing::warn!("failed to write guardian state file: {error:#}");
            }
        }
    })
}

/// One exhausted-supervision alert, appended as a JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianAlert {
    pub process: String,
    pub consecutive_failures: u32,
    pub max_retries: u32,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AlertLog {
    path: PathBuf,
}

impl AlertLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, alert: &GuardianAlert) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(alert)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn read_all(&self) -> Result<Vec<GuardianAlert>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("malformed alert line"))
            .collect()
    }
}
