use super::conversation::{Conversation, ExchangeDraft};
use crate::config::BackendConfig;
use crate::llm::{
    Backend, ChatEvent, ChatRequest, CollectedResponse, CompositeParser, FinishReason,
    ParseOutcome, StreamCollector, StreamSink, ToolCall, ToolCallParser, augment_system_prompt,
};
use crate::tools::{ToolContext, ToolRegistry};
use futures_util::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

// ── Public types ─────────────────────────────────────────────────────────────

/// Where the loop is within one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoopState {
    Idle,
    AwaitingModel,
    ParsingOutput,
    DispatchingTools,
    Terminal,
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered without requesting tools.
    Completed { text: String },
    /// The turn budget ran out; a notice was appended.
    Truncated { text: String },
    /// The backend failed; nothing was committed.
    ConnectionFailed { detail: String },
    /// Aborted or interrupted by a backend switch; nothing was committed.
    Cancelled { reason: String },
}

impl TurnOutcome {
    /// Whether the exchange was appended to the conversation.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Truncated { .. })
    }
}

/// Final output of [`AgentLoop::run_exchange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReport {
    pub outcome: TurnOutcome,
    /// Model round-trips issued.
    pub rounds: u32,
    /// Tool calls dispatched.
    pub tool_calls: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub turn_budget: u32,
    pub temperature: f64,
    /// Committed turns sent per request; 0 sends all.
    pub history_limit: usize,
}

/// Parameters for a single [`AgentLoop::run_exchange`] invocation.
pub struct ExchangeParams<'a> {
    pub backend: &'a dyn Backend,
    pub profile: &'a BackendConfig,
    pub system_prompt: &'a str,
    pub user_input: &'a str,
    pub ctx: &'a ToolContext,
    pub sink: &'a dyn StreamSink,
    pub cancel: &'a CancellationToken,
}

/// Drives model round-trips and tool dispatch for one user request at a time.
pub struct AgentLoop {
    registry: Arc<ToolRegistry>,
    parser: Arc<dyn ToolCallParser>,
    settings: LoopSettings,
    state: watch::Sender<LoopState>,
}

// ── Internal types ───────────────────────────────────────────────────────────

enum StreamResult {
    Complete(CollectedResponse),
    Failed(String),
    Cancelled,
}

// ── Implementation ───────────────────────────────────────────────────────────

impl AgentLoop {
    pub fn new(registry: Arc<ToolRegistry>, settings: LoopSettings) -> Self {
        Self::with_parser(registry, Arc::new(CompositeParser::default()), settings)
    }

    pub fn with_parser(
        registry: Arc<ToolRegistry>,
        parser: Arc<dyn ToolCallParser>,
        settings: LoopSettings,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            registry,
            parser,
            settings: LoopSettings {
                turn_budget: settings.turn_budget.max(1),
                ..settings
            },
            state,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> LoopSettings {
        self.settings
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: LoopState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "agent loop transition");
        }
    }

    /// Run one user request to a terminal outcome.
    ///
    /// Turns are staged in a draft and appended to `conversation` only when
    /// the exchange completes or is truncated. A connection failure or
    /// cancellation leaves `conversation` exactly as it was.
    pub async fn run_exchange(
        &self,
        conversation: &mut Conversation,
        params: ExchangeParams<'_>,
    ) -> ExchangeReport {
        let specs = self.registry.specs();
        let system_prompt = if specs.is_empty() {
            params.system_prompt.to_string()
        } else {
            augment_system_prompt(params.system_prompt, &specs)
        };
        let native_tools = if params.profile.native_tools {
            specs
        } else {
            Vec::new()
        };

        let budget = self.settings.turn_budget;
        let mut draft = ExchangeDraft::new(params.user_input);
        let mut tool_calls = 0;

        for round in 1..=budget {
            self.set_state(LoopState::AwaitingModel);
            let request = ChatRequest {
                model: params.profile.model.clone(),
                system: Some(system_prompt.clone()),
                turns: conversation
                    .request_window(self.settings.history_limit)
                    .iter()
                    .chain(draft.turns())
                    .cloned()
                    .collect(),
                tools: native_tools.clone(),
                temperature: self.settings.temperature,
            };

            let response = match self
                .stream_once(params.backend, request, params.sink, params.cancel)
                .await
            {
                StreamResult::Complete(response) => response,
                StreamResult::Failed(detail) => {
                    tracing::warn!(
                        backend = params.profile.name,
                        round,
                        "model stream failed: {detail}"
                    );
                    return self.finish(TurnOutcome::ConnectionFailed { detail }, round, tool_calls);
                }
                StreamResult::Cancelled => {
                    let reason = "cancelled".to_string();
                    return self.finish(TurnOutcome::Cancelled { reason }, round, tool_calls);
                }
            };

            self.set_state(LoopState::ParsingOutput);
            if response.finish_reason == Some(FinishReason::Length) {
                tracing::warn!(round, "model output hit the length limit");
            }
            let calls = self.extract_calls(&response);

            if calls.is_empty() {
                draft.push_assistant(response.text.clone(), Vec::new());
                conversation.commit(draft);
                let outcome = TurnOutcome::Completed {
                    text: response.text,
                };
                return self.finish(outcome, round, tool_calls);
            }

            draft.push_assistant(response.text, calls.clone());
            self.set_state(LoopState::DispatchingTools);
            let round_ctx = params.ctx.for_call("", round);
            for call in &calls {
                if params.cancel.is_cancelled() {
                    let reason = "cancelled".to_string();
                    return self.finish(TurnOutcome::Cancelled { reason }, round, tool_calls);
                }
                let result = self.registry.dispatch(call, &round_ctx).await;
                draft.push_tool(call, &result);
                tool_calls += 1;
            }
        }

        let notice = format!(
            "[stopped: turn budget of {budget} model round-trips exhausted before a final answer]"
        );
        tracing::warn!(budget, tool_calls, "turn budget exhausted");
        draft.push_assistant(notice.clone(), Vec::new());
        conversation.commit(draft);
        self.finish(TurnOutcome::Truncated { text: notice }, budget, tool_calls)
    }

    fn finish(&self, outcome: TurnOutcome, rounds: u32, tool_calls: usize) -> ExchangeReport {
        self.set_state(LoopState::Terminal);
        self.set_state(LoopState::Idle);
        ExchangeReport {
            outcome,
            rounds,
            tool_calls,
        }
    }

    /// One model round-trip, forwarding every event to the sink.
    async fn stream_once(
        &self,
        backend: &dyn Backend,
        request: ChatRequest,
        sink: &dyn StreamSink,
        cancel: &CancellationToken,
    ) -> StreamResult {
        let mut stream = backend.stream_chat(request, cancel.clone());
        let mut collector = StreamCollector::new();

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => return StreamResult::Cancelled,
                event = stream.next() => event,
            };
            let Some(event) = event else {
                break;
            };
            sink.on_event(&event).await;
            match event {
                ChatEvent::ConnectionError(detail) => return StreamResult::Failed(detail),
                ChatEvent::Done(_) => {
                    collector.feed(&event);
                    return StreamResult::Complete(collector.finish());
                }
                ChatEvent::TextDelta(_) | ChatEvent::ToolCallDelta(_) => collector.feed(&event),
            }
        }

        if cancel.is_cancelled() {
            StreamResult::Cancelled
        } else {
            StreamResult::Failed("stream ended before completion".to_string())
        }
    }

    /// Native calls win; otherwise the text is scanned for directives.
    fn extract_calls(&self, response: &CollectedResponse) -> Vec<ToolCall> {
        let mut calls = if response.native_calls.is_empty() {
            match self.parser.parse(&response.text) {
                ParseOutcome::ToolCalls(calls) => calls,
                ParseOutcome::Malformed { reason } => {
                    tracing::warn!(
                        parser = self.parser.name(),
                        "model output looked like a tool call but was not: {reason}"
                    );
                    Vec::new()
                }
                ParseOutcome::TextOnly => Vec::new(),
            }
        } else {
            response.native_calls.clone()
        };
        ensure_unique_ids(&mut calls);
        calls
    }
}

fn ensure_unique_ids(calls: &mut [ToolCall]) {
    let mut seen = HashSet::new();
    let mut next = 1;
    for call in calls.iter_mut() {
        if call.id.trim().is_empty() || seen.contains(&call.id) {
            let mut candidate = format!("call_{next}");
            while seen.contains(&candidate) {
                next += 1;
                candidate = format!("call_{next}");
            }
            call.id = candidate;
        }
        next += 1;
        seen.insert(call.id.clone());
    }
}
