use super::conversation::Conversation;
use super::prompt::build_system_prompt;
use super::tool_loop::{AgentLoop, ExchangeParams, ExchangeReport, LoopSettings, LoopState, TurnOutcome};
use crate::config::{BackendConfig, Config};
use crate::error::BackendError;
use crate::llm::{BackendSwitchManager, StreamSink};
use crate::tools::{ToolContext, ToolRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CONTROL_CAPACITY: usize = 16;

/// Requests that may arrive while a response is streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionControl {
    SwitchBackend(String),
    SwitchModel(String),
    Abort,
}

/// Cloneable sender for [`SessionControl`] commands (Ctrl-C handler, UI).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionControl>,
}

impl SessionHandle {
    /// Queue a command; returns `false` when the queue is full or closed.
    pub fn send(&self, command: SessionControl) -> bool {
        self.tx.try_send(command).is_ok()
    }

    pub fn abort(&self) -> bool {
        self.send(SessionControl::Abort)
    }

    /// Abort the running exchange once `signal` fires successfully. The
    /// caller aborts the returned task when the exchange ends first.
    pub fn abort_on<F, E>(self, signal: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        tokio::spawn(async move {
            if signal.await.is_ok() {
                self.abort();
            }
        })
    }
}

/// One interactive conversation: the committed history, the loop that
/// extends it, and the backend it currently talks to.
pub struct AgentSession {
    session_id: String,
    agent: AgentLoop,
    backends: Arc<BackendSwitchManager>,
    conversation: Conversation,
    ctx: ToolContext,
    custom_prompt: Option<String>,
    sink: Arc<dyn StreamSink>,
    control_tx: mpsc::Sender<SessionControl>,
    control_rx: mpsc::Receiver<SessionControl>,
    last_failed_input: Option<String>,
}

impl AgentSession {
    pub fn new(
        agent: AgentLoop,
        backends: Arc<BackendSwitchManager>,
        workspace_dir: impl Into<PathBuf>,
        custom_prompt: Option<String>,
        sink: Arc<dyn StreamSink>,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let session_id = uuid::Uuid::new_v4().to_string();
        Self {
            ctx: ToolContext::new(workspace_dir).with_session(session_id.clone()),
            session_id,
            agent,
            backends,
            conversation: Conversation::new(),
            custom_prompt,
            sink,
            control_tx,
            control_rx,
            last_failed_input: None,
        }
    }

    pub fn from_config(
        config: &Config,
        registry: Arc<ToolRegistry>,
        backends: Arc<BackendSwitchManager>,
        sink: Arc<dyn StreamSink>,
    ) -> Self {
        let settings = LoopSettings {
            turn_budget: config.agent.effective_turn_budget(),
            temperature: config.agent.temperature,
            history_limit: config.agent.history_limit,
        };
        Self::new(
            AgentLoop::new(registry, settings),
            backends,
            config.workspace_dir.clone(),
            config.agent.system_prompt.clone(),
            sink,
        )
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.control_tx.clone(),
        }
    }

    /// Key under which tools keep this session's state.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    pub fn backends(&self) -> &Arc<BackendSwitchManager> {
        &self.backends
    }

    pub fn active_profile(&self) -> Arc<BackendConfig> {
        self.backends.active()
    }

    pub fn workspace_dir(&self) -> &std::path::Path {
        &self.ctx.workspace_dir
    }

    pub fn last_failed_input(&self) -> Option<&str> {
        self.last_failed_input.as_deref()
    }

    /// Switch backend profile. Only legal between exchanges.
    pub fn switch_backend(&self, name: &str) -> Result<Arc<BackendConfig>, BackendError> {
        self.ensure_idle()?;
        self.backends.switch_to(name)
    }

    /// Switch model on the active profile. Only legal between exchanges.
    pub fn switch_model(&self, model: &str) -> Result<Arc<BackendConfig>, BackendError> {
        self.ensure_idle()?;
        Ok(self.backends.set_model(model))
    }

    fn ensure_idle(&self) -> Result<(), BackendError> {
        if self.agent.state() == LoopState::Idle {
            Ok(())
        } else {
            Err(BackendError::Busy)
        }
    }

    /// Forget the conversation and the tool state tied to it (the `/clear`
    /// command). The session continues under a fresh id.
    pub fn clear(&mut self) {
        self.agent.registry().end_session(&self.session_id);
        self.session_id = uuid::Uuid::new_v4().to_string();
        self.ctx = self.ctx.clone().with_session(self.session_id.clone());
        self.conversation.reset();
        self.last_failed_input = None;
    }

    /// Send one user request through the agent loop.
    ///
    /// Control commands received while the exchange runs cancel it; the
    /// command is applied once the loop is back to idle, and the partial
    /// exchange is discarded.
    pub async fn submit(&mut self, input: &str) -> ExchangeReport {
        self.drain_idle_controls();

        let profile = self.backends.active();
        let backend = self.backends.connector_for(&profile);
        let system_prompt = build_system_prompt(
            &self.ctx.workspace_dir,
            &profile.model,
            self.custom_prompt.as_deref(),
        );
        let cancel = CancellationToken::new();
        let mut pending: Option<SessionControl> = None;

        let mut report = {
            let exchange = self.agent.run_exchange(
                &mut self.conversation,
                ExchangeParams {
                    backend: backend.as_ref(),
                    profile: &profile,
                    system_prompt: &system_prompt,
                    user_input: input,
                    ctx: &self.ctx,
                    sink: self.sink.as_ref(),
                    cancel: &cancel,
                },
            );
            tokio::pin!(exchange);

            loop {
                tokio::select! {
                    report = &mut exchange => break report,
                    Some(command) = self.control_rx.recv(), if pending.is_none() => {
                        tracing::info!(?command, "interrupting in-flight exchange");
                        cancel.cancel();
                        pending = Some(command);
                    }
                }
            }
        };

        if let Some(command) = pending {
            let reason = self.apply_control(command);
            if let TurnOutcome::Cancelled { .. } = report.outcome {
                report.outcome = TurnOutcome::Cancelled { reason };
            }
        }

        if report.outcome.is_committed() {
            self.last_failed_input = None;
        } else {
            self.last_failed_input = Some(input.to_string());
        }
        report
    }

    /// Re-submit the last failed or cancelled input, if any.
    pub async fn retry(&mut self) -> Option<ExchangeReport> {
        let input = self.last_failed_input.clone()?;
        Some(self.submit(&input).await)
    }

    /// Apply switches queued while idle; stale aborts are dropped.
    fn drain_idle_controls(&mut self) {
        while let Ok(command) = self.control_rx.try_recv() {
            if command != SessionControl::Abort {
                self.apply_control(command);
            }
        }
    }

    fn apply_control(&self, command: SessionControl) -> String {
        match command {
            SessionControl::Abort => "aborted by user".to_string(),
            SessionControl::SwitchBackend(name) => match self.backends.switch_to(&name) {
                Ok(profile) => format!("switched backend to {} ({})", profile.name, profile.model),
                Err(error) => {
                    tracing::warn!("backend switch failed: {error}");
                    format!("backend switch failed: {error}")
                }
            },
            SessionControl::SwitchModel(model) => {
                let profile = self.backends.set_model(&model);
                format!("switched model to {}", profile.model)
            }
        }
    }
}

impl Drop for AgentSession {
    fn drop(&mut self) {
        self.agent.registry().end_session(&self.session_id);
    }
}
