use crate::config::{Config, GuardedProcessConfig, ProbeConfig};
use crate::error::GuardianError;
use crate::llm::build_probe_client;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::{Duration, SystemTime};
use tokio::process::{Child, Command};

/// Probe deadline for HTTP and TCP liveness checks.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
/// How long to wait for a killed child to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

pub type ControlFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The minimal capability the guardian needs from a supervised process.
pub trait ProcessControl: Send {
    fn start(&mut self) -> ControlFuture<'_, Result<(), GuardianError>>;

    /// Process exists and its liveness probe (if any) passes.
    fn is_alive(&mut self) -> ControlFuture<'_, bool>;

    /// Stop the process if it is still present. Idempotent.
    fn terminate(&mut self) -> ControlFuture<'_, ()>;
}

/// A real child process started from `[[guardian.processes]]`.
pub struct OsProcess {
    name: String,
    command: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    log_file: Option<PathBuf>,
    probe: Probe,
    child: Option<Child>,
    started_at: Option<SystemTime>,
}

enum Probe {
    None,
    Http { url: String, client: reqwest::Client },
    Tcp { addr: String },
    Heartbeat { path: PathBuf, max_age: Duration },
}

impl OsProcess {
    pub fn from_config(process: &GuardedProcessConfig, config: &Config) -> Self {
        let probe = match &process.probe {
            ProbeConfig::None => Probe::None,
            ProbeConfig::Http { url } => Probe::Http {
                url: url.clone(),
                client: build_probe_client(PROBE_TIMEOUT),
            },
            ProbeConfig::Tcp { addr } => Probe::Tcp { addr: addr.clone() },
            ProbeConfig::Heartbeat { path, max_age_secs } => Probe::Heartbeat {
                path: config.resolve_path(path),
                max_age: Duration::from_secs(*max_age_secs),
            },
        };
        Self {
            name: process.name.clone(),
            command: process.command.clone(),
            args: process.args.clone(),
            cwd: process.cwd.as_deref().map(|raw| config.resolve_path(raw)),
            log_file: process.log_file.as_deref().map(|raw| config.resolve_path(raw)),
            probe,
            child: None,
            started_at: None,
        }
    }

    fn spawn_child(&self) -> Result<Child, GuardianError> {
        let spawn_error = |message: String| GuardianError::Spawn {
            name: self.name.clone(),
            message,
        };

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        match &self.log_file {
            Some(path) => {
                let stdout = open_log(path).map_err(|e| spawn_error(e.to_string()))?;
                let stderr = stdout.try_clone().map_err(|e| spawn_error(e.to_string()))?;
                command.stdout(stdout).stderr(stderr);
            }
            None => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        command.spawn().map_err(|e| spawn_error(e.to_string()))
    }

    async fn probe_passes(&self) -> bool {
        match &self.probe {
            Probe::None => true,
            Probe::Http { url, client } => match client.get(url).send().await {
                Ok(response) => response.status().is_success(),
                Err(error) => {
                    tracing::debug!(process = %self.name, %error, "http probe failed");
                    false
                }
            },
            Probe::Tcp { addr } => matches!(
                tokio::time::timeout(PROBE_TIMEOUT, tokio::net::TcpStream::connect(addr)).await,
                Ok(Ok(_))
            ),
            Probe::Heartbeat { path, max_age } => {
                heartbeat_is_fresh(path, *max_age, self.started_at).await
            }
        }
    }
}

impl ProcessControl for OsProcess {
    fn start(&mut self) -> ControlFuture<'_, Result<(), GuardianError>> {
        Box::pin(async move {
            self.terminate().await;
            let child = self.spawn_child()?;
            tracing::info!(process = %self.name, pid = child.id(), "spawned guarded process");
            self.child = Some(child);
            self.started_at = Some(SystemTime::now());
            Ok(())
        })
    }

    fn is_alive(&mut self) -> ControlFuture<'_, bool> {
        Box::pin(async move {
            let Some(child) = self.child.as_mut() else {
                return false;
            };
            match child.try_wait() {
                Ok(None) => {}
                Ok(Some(status)) => {
                    tracing::warn!(process = %self.name, %status, "guarded process exited");
                    self.child = None;
                    return false;
                }
                Err(error) => {
                    tracing::warn!(process = %self.name, %error, "cannot poll guarded process");
                    return false;
                }
            }
            self.probe_passes().await
        })
    }

    fn terminate(&mut self) -> ControlFuture<'_, ()> {
        Box::pin(async move {
            let Some(mut child) = self.child.take() else {
                return;
            };
            if let Err(error) = child.start_kill() {
                tracing::debug!(process = %self.name, %error, "kill signal not delivered");
            }
            if tokio::time::timeout(REAP_TIMEOUT, child.wait())
                .await
                .is_err()
            {
                tracing::warn!(process = %self.name, "guarded process did not exit after kill");
            }
        })
    }
}

fn open_log(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

/// Fresh when the file, or failing that the latest start, is younger than
/// `max_age`. A just-restarted process gets a full window to write.
async fn heartbeat_is_fresh(path: &Path, max_age: Duration, started_at: Option<SystemTime>) -> bool {
    let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => Some(modified),
        Err(error) => {
            tracing::debug!(path = %path.display(), %error, "heartbeat file unreadable");
            None
        }
    };
    let Some(latest) = modified.max(started_at) else {
        return false;
    };
    SystemTime::now()
        .duration_since(latest)
        .map_or(true, |age| age <= max_age)
}
