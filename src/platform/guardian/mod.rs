//! Process Guardian: keeps sibling processes alive under a capped
//! exponential restart policy.
//!
//! Each guarded process gets its own supervisory task that owns the process
//! handle. Supervisors publish their record to a shared [`ProcessBoard`] and
//! broadcast [`GuardianEvent`]s; a state writer flushes the board to disk.

mod policy;
mod process;
mod requests;
mod state;
mod supervisor;

pub use policy::{RestartDecision, RestartPolicy};
pub use process::{ControlFuture, OsProcess, ProcessControl};
pub use requests::RestartRequests;
pub use state::{
    AlertLog, GuardedProcess, GuardianAlert, GuardianStatus, ProcessBoard, ProcessState,
    read_state_file, write_state_file,
};
pub use supervisor::{GuardianEvent, GuardianEventKind};

use crate::config::{Config, RestartConfig};
use crate::error::GuardianError;
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use supervisor::ProcessSupervisor;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct GuardianSettings {
    pub check_interval: Duration,
    pub alert_file: PathBuf,
    /// When set, the board is flushed here periodically and on shutdown.
    pub state_file: Option<PathBuf>,
    /// When set, supervisors honour restart requests left in this directory.
    pub restart_dir: Option<PathBuf>,
}

impl GuardianSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            check_interval: config.guardian.check_interval(),
            alert_file: config.resolve_path(&config.guardian.alert_file),
            state_file: Some(config.resolve_path(&config.guardian.state_file)),
            restart_dir: Some(config.resolve_path(&config.guardian.restart_dir)),
        }
    }
}

/// Static description of one process handed to [`Guardian::start`].
pub struct GuardedEntry {
    pub name: String,
    pub command: String,
    pub restart: RestartConfig,
    pub control: Box<dyn ProcessControl>,
}

pub struct Guardian {
    board: ProcessBoard,
    events: broadcast::Sender<GuardianEvent>,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    settings: GuardianSettings,
}

impl Guardian {
    /// Register every entry, then spawn one supervisor per process.
    pub fn start(
        settings: GuardianSettings,
        entries: Vec<GuardedEntry>,
    ) -> Result<Self, GuardianError> {
        let board = ProcessBoard::new();
        for entry in &entries {
            if board.contains(&entry.name) {
                return Err(GuardianError::DuplicateProcess(entry.name.clone()));
            }
            board.insert(GuardedProcess::new(
                entry.name.clone(),
                entry.command.clone(),
                entry.restart,
            ));
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let cancel = CancellationToken::new();
        let alerts = AlertLog::new(settings.alert_file.clone());
        let restarts = settings.restart_dir.clone().map(RestartRequests::new);
        let mut handles = Vec::with_capacity(entries.len() + 1);

        if let Some(path) = &settings.state_file {
            handles.push(state::spawn_state_writer(
                path.clone(),
                board.clone(),
                cancel.child_token(),
            ));
        }

        for entry in entries {
            let supervisor = ProcessSupervisor {
                name: entry.name,
                control: entry.control,
                policy: RestartPolicy::from_config(&entry.restart),
                check_interval: settings.check_interval,
                board: board.clone(),
                events: events.clone(),
                alerts: alerts.clone(),
                restarts: restarts.clone(),
            };
            handles.push(supervisor.spawn(cancel.child_token()));
        }

        Ok(Self {
            board,
            events,
            cancel,
            handles,
            settings,
        })
    }

    /// Build [`OsProcess`] entries for every `[[guardian.processes]]` item.
    pub fn from_config(config: &Config) -> Result<Self, GuardianError> {
        let entries = config
            .guardian
            .processes
            .iter()
            .map(|process| GuardedEntry {
                name: process.name.clone(),
                command: std::iter::once(process.command.as_str())
                    .chain(process.args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" "),
                restart: process.restart,
                control: Box::new(OsProcess::from_config(process, config)),
            })
            .collect();
        Self::start(GuardianSettings::from_config(config), entries)
    }

    pub fn board(&self) -> &ProcessBoard {
        &self.board
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GuardianEvent> {
        self.events.subscribe()
    }

    /// Stop every non-terminal process, cancel pending restarts and write a
    /// final state file.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        if let Some(path) = &self.settings.state_file
            && let Err(error) = write_state_file(path, &self.board).await
        {
            tracing::warn!("failed to write final guardian state: {error:#}");
        }
    }
}

/// `camel guardian`: supervise the configured fleet until Ctrl-C.
pub async fn run(config: &Config) -> Result<()> {
    let guardian = Guardian::from_config(config)?;
    tracing::info!(
        processes = guardian.board().snapshot().len(),
        check_interval_secs = config.guardian.check_interval_secs,
        "guardian started"
    );
    println!("◆ Guardian supervising {} process(es)", guardian.board().snapshot().len());
    println!("  Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("guardian shutdown requested");
    guardian.shutdown().await;
    Ok(())
}
