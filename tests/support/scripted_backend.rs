#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use camel::llm::{
    Backend, BackendFuture, ChatEvent, ChatRequest, ChatStream, FinishReason, ToolCallFragment,
};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

/// What one `stream_chat` call produces.
#[derive(Debug, Clone)]
pub enum Script {
    Events(Vec<ChatEvent>),
    /// Emit the events, then never finish (until cancelled).
    Stall(Vec<ChatEvent>),
}

impl Script {
    pub fn text(text: &str) -> Self {
        Self::Events(vec![
            ChatEvent::TextDelta(text.to_string()),
            ChatEvent::Done(FinishReason::Stop),
        ])
    }

    /// A response carrying one text-protocol tool call per `(name, args)`.
    pub fn tagged_calls(calls: &[(&str, serde_json::Value)]) -> Self {
        let mut text = String::from("Working on it.\n");
        for (name, arguments) in calls {
            let body = serde_json::json!({"name": name, "arguments": arguments});
            text.push_str(&format!("<tool_call>{body}</tool_call>\n"));
        }
        Self::text(&text)
    }

    pub fn native_call(id: &str, name: &str, arguments: &str) -> Self {
        Self::Events(vec![
            ChatEvent::ToolCallDelta(ToolCallFragment {
                index: 0,
                id: Some(id.to_string()),
                name: Some(name.to_string()),
                arguments_delta: arguments.to_string(),
            }),
            ChatEvent::Done(FinishReason::ToolCalls),
        ])
    }

    pub fn connection_error(detail: &str) -> Self {
        Self::Events(vec![ChatEvent::ConnectionError(detail.to_string())])
    }
}

/// In-memory backend replaying a fixed script, one entry per request.
pub struct ScriptedBackend {
    name: String,
    script: Mutex<VecDeque<Script>>,
    /// Used once the script runs out.
    fallback: Script,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedBackend {
    pub fn new(name: &str, script: Vec<Script>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            fallback: Script::text("(script exhausted)"),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn repeating(name: &str, script: Script) -> Self {
        Self {
            fallback: script,
            ..Self::new(name, Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Backend for ScriptedBackend {
    fn profile_name(&self) -> &str {
        &self.name
    }

    fn stream_chat(&self, request: ChatRequest, _cancel: CancellationToken) -> ChatStream {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match next {
            Script::Events(events) => Box::pin(futures_util::stream::iter(events)),
            Script::Stall(events) => Box::pin(
                futures_util::stream::iter(events).chain(futures_util::stream::pending()),
            ),
        }
    }

    fn health_check(&self) -> BackendFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn list_models(&self) -> BackendFuture<'_, Vec<String>> {
        Box::pin(async { Ok(vec!["scripted".to_string()]) })
    }
}
