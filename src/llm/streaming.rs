use super::types::ToolCall;
use futures_util::Stream;
use serde_json::{Map, Value};
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;

/// Lazy, finite, single-use sequence of events for one request.
pub type ChatStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send + 'static>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other(String),
}

impl FinishReason {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" => Self::Stop,
            "tool_calls" | "tool_use" | "function_call" => Self::ToolCalls,
            "length" | "max_tokens" => Self::Length,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Partial native tool call; fragments sharing an `index` are concatenated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments_delta: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    TextDelta(String),
    ToolCallDelta(ToolCallFragment),
    Done(FinishReason),
    /// Transport, status, timeout or framing failure. Always the last event.
    ConnectionError(String),
}

pub trait StreamSink: Send + Sync {
    fn on_event<'a>(&'a self, event: &'a ChatEvent) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

#[derive(Debug, Default)]
pub struct NullStreamSink;

impl StreamSink for NullStreamSink {
    fn on_event<'a>(
        &'a self,
        _event: &'a ChatEvent,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

/// Prints text deltas to stdout as they arrive.
pub struct CliStreamSink {
    writer: Arc<dyn Fn(&str) + Send + Sync>,
}

impl CliStreamSink {
    pub fn new() -> Self {
        Self {
            writer: Arc::new(|text| {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(text.as_bytes());
                let _ = stdout.flush();
            }),
        }
    }

    pub fn with_writer(writer: Arc<dyn Fn(&str) + Send + Sync>) -> Self {
        Self { writer }
    }
}

impl Default for CliStreamSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSink for CliStreamSink {
    fn on_event<'a>(&'a self, event: &'a ChatEvent) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if let ChatEvent::TextDelta(text) = event {
                (self.writer)(text);
            }
        })
    }
}

/// Accumulated output of one streamed response.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedResponse {
    pub text: String,
    /// Native tool calls assembled from deltas, in index order.
    pub native_calls: Vec<ToolCall>,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Default)]
pub struct StreamCollector {
    text: String,
    tool_call_builders: Vec<ToolCallBuilder>,
    finish_reason: Option<FinishReason>,
}

impl StreamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn feed(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::TextDelta(text) => self.text.push_str(text),
            ChatEvent::ToolCallDelta(fragment) => {
                let Ok(index) = usize::try_from(fragment.index) else {
                    tracing::warn!(
                        index = fragment.index,
                        "Skipping tool call delta due to non-convertible index"
                    );
                    return;
                };
                if self.tool_call_builders.len() <= index {
                    self.tool_call_builders
                        .resize_with(index + 1, ToolCallBuilder::default);
                }
                let builder = &mut self.tool_call_builders[index];
                if let Some(id) = &fragment.id {
                    builder.id.clone_from(id);
                }
                if let Some(name) = &fragment.name {
                    builder.name.clone_from(name);
                }
                builder.arguments.push_str(&fragment.arguments_delta);
            }
            ChatEvent::Done(reason) => self.finish_reason = Some(reason.clone()),
            ChatEvent::ConnectionError(_) => {}
        }
    }

    pub fn finish(self) -> CollectedResponse {
        let mut native_calls = Vec::new();
        for (index, builder) in self.tool_call_builders.into_iter().enumerate() {
            if builder.name.is_empty() {
                if !builder.arguments.trim().is_empty() {
                    tracing::warn!("Skipping streamed tool call without a name");
                }
                continue;
            }
            let arguments = if builder.arguments.trim().is_empty() {
                Map::new()
            } else {
                match serde_json::from_str::<Value>(&builder.arguments) {
                    Ok(Value::Object(map)) => map,
                    Ok(_) | Err(_) => {
                        tracing::warn!(
                            tool_name = builder.name,
                            "Skipping malformed streamed tool call arguments"
                        );
                        continue;
                    }
                }
            };
            let id = if builder.id.is_empty() {
                format!("call_{}", index + 1)
            } else {
                builder.id
            };
            native_calls.push(ToolCall {
                id,
                name: builder.name,
                arguments,
            });
        }

        CollectedResponse {
            text: self.text,
            native_calls,
            finish_reason: self.finish_reason,
        }
    }
}
