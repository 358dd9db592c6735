use super::policy::{RestartDecision, RestartPolicy};
use super::process::ProcessControl;
use super::requests::RestartRequests;
use super::state::{AlertLog, GuardianAlert, ProcessBoard, ProcessState};
use crate::error::GuardianError;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianEvent {
    pub process: String,
    pub kind: GuardianEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardianEventKind {
    Started,
    /// First passing health check since the last start.
    Healthy,
    Failed { failures: u32 },
    RestartScheduled { delay: Duration },
    /// A restart request was honoured; no failure is counted.
    RestartRequested,
    Exhausted,
    Stopped,
}

enum Flow {
    Continue,
    Exit,
}

/// One supervisory task: owns the process handle and is the sole writer of
/// its board record.
pub(super) struct ProcessSupervisor {
    pub(super) name: String,
    pub(super) control: Box<dyn ProcessControl>,
    pub(super) policy: RestartPolicy,
    pub(super) check_interval: Duration,
    pub(super) board: ProcessBoard,
    pub(super) events: broadcast::Sender<GuardianEvent>,
    pub(super) alerts: AlertLog,
    pub(super) restarts: Option<RestartRequests>,
}

impl ProcessSupervisor {
    pub(super) fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(mut self, cancel: CancellationToken) {
        let mut failures: u32 = 0;
        let mut needs_start = true;
        let mut confirmed = false;

        loop {
            if cancel.is_cancelled() {
                self.stop().await;
                return;
            }

            if needs_start {
                self.set_state(ProcessState::Starting, failures);
                match self.control.start().await {
                    Ok(()) => {
                        needs_start = false;
                        confirmed = false;
                        self.board.update(&self.name, |record| {
                            record.state = ProcessState::Running;
                            record.last_started_at = Some(Utc::now());
                        });
                        tracing::info!(process = %self.name, failures, "guarded process started");
                        self.emit(GuardianEventKind::Started);
                    }
                    Err(error) => {
                        tracing::warn!(process = %self.name, "start failed: {error}");
                        failures = failures.saturating_add(1);
                        match self.on_failure(failures, &cancel).await {
                            Flow::Continue => continue,
                            Flow::Exit => return,
                        }
                    }
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.stop().await;
                    return;
                }
                () = tokio::time::sleep(self.check_interval) => {}
            }

            if let Some(requests) = &self.restarts
                && requests.take(&self.name).await
            {
                tracing::info!(process = %self.name, "restart requested");
                self.control.terminate().await;
                self.emit(GuardianEventKind::RestartRequested);
                needs_start = true;
                continue;
            }

            if self.control.is_alive().await {
                if !confirmed {
                    confirmed = true;
                    if failures > 0 {
                        tracing::info!(process = %self.name, failures, "guarded process recovered");
                    }
                    failures = 0;
                    self.set_state(ProcessState::Running, failures);
                    self.emit(GuardianEventKind::Healthy);
                }
                continue;
            }

            failures = failures.saturating_add(1);
            tracing::warn!(process = %self.name, failures, "health check failed");
            needs_start = true;
            if let Flow::Exit = self.on_failure(failures, &cancel).await {
                return;
            }
        }
    }

    /// Record a failure, then either wait out the backoff or give up.
    async fn on_failure(&mut self, failures: u32, cancel: &CancellationToken) -> Flow {
        self.set_state(ProcessState::Failed, failures);
        self.emit(GuardianEventKind::Failed { failures });
        self.control.terminate().await;

        let delay = match self.policy.decide(failures) {
            RestartDecision::RestartAfter(delay) => delay,
            RestartDecision::Exhausted => {
                self.exhaust(failures).await;
                return Flow::Exit;
            }
        };

        tracing::info!(
            process = %self.name,
            failures,
            delay_secs = delay.as_secs(),
            "restart scheduled"
        );
        self.emit(GuardianEventKind::RestartScheduled { delay });
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.stop().await;
                Flow::Exit
            }
            () = tokio::time::sleep(delay) => Flow::Continue,
        }
    }

    async fn exhaust(&mut self, failures: u32) {
        let error = GuardianError::SupervisionExhausted {
            name: self.name.clone(),
            max_retries: self.policy.max_retries,
        };
        tracing::error!(process = %self.name, failures, "{error}");
        let alert = GuardianAlert {
            process: self.name.clone(),
            consecutive_failures: failures,
            max_retries: self.policy.max_retries,
            message: error.to_string(),
            raised_at: Utc::now(),
        };
        if let Err(write_error) = self.alerts.append(&alert).await {
            tracing::error!(
                process = %self.name,
                path = %self.alerts.path().display(),
                "failed to record alert: {write_error:#}"
            );
        }
        self.emit(GuardianEventKind::Exhausted);
    }

    async fn stop(&mut self) {
        self.control.terminate().await;
        self.board.update(&self.name, |record| {
            if !record.is_terminal() {
                record.state = ProcessState::Stopped;
            }
        });
        tracing::info!(process = %self.name, "guarded process stopped");
        self.emit(GuardianEventKind::Stopped);
    }

    fn set_state(&self, state: ProcessState, failures: u32) {
        self.board.update(&self.name, |record| {
            record.state = state;
            record.consecutive_failures = failures;
        });
    }

    fn emit(&self, kind: GuardianEventKind) {
        let _ = self.events.send(GuardianEvent {
            process: self.name.clone(),
            kind,
        });
    }
}
