mod types;

use self::types::{
    ChatBody, ChatChunk, Message, MessageToolCall, MessageToolFunction, Options, TagsResponse,
    ToolDefinition, ToolFunctionDefinition,
};
use super::http_client::{build_backend_client, build_probe_client};
use super::sse::SseBuffer;
use super::streaming::{ChatEvent, ChatStream, FinishReason, ToolCallFragment};
use super::tool_protocol::render_tool_result;
use super::traits::{Backend, BackendFuture};
use super::transport::{FrameDecoder, StreamLimits, stream_response};
use super::types::{ChatRequest, Role};
use anyhow::Context;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connector for Ollama's `/api/chat` endpoint.
pub struct OllamaBackend {
    profile: String,
    base_url: String,
    api_key: Option<String>,
    limits: StreamLimits,
    client: Client,
}

impl OllamaBackend {
    pub fn new(
        profile: impl Into<String>,
        endpoint: &str,
        api_key: Option<String>,
        limits: StreamLimits,
    ) -> Self {
        Self {
            profile: profile.into(),
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_key,
            limits,
            client: build_backend_client(),
        }
    }

    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn build_body(request: &ChatRequest) -> ChatBody {
        let native = !request.tools.is_empty();
        let mut messages = Vec::with_capacity(request.turns.len() + 1);

        if let Some(system) = &request.system {
            messages.push(text_message("system", system.clone()));
        }

        for turn in &request.turns {
            let message = match turn.role {
                Role::User => text_message("user", turn.content.clone()),
                Role::Assistant if native => Message {
                    role: "assistant",
                    content: turn.content.clone(),
                    tool_calls: turn
                        .tool_calls
                        .iter()
                        .map(|call| MessageToolCall {
                            function: MessageToolFunction {
                                name: call.name.clone(),
                                arguments: Value::Object(call.arguments.clone()),
                            },
                        })
                        .collect(),
                    tool_name: None,
                },
                Role::Assistant => text_message("assistant", turn.content.clone()),
                Role::Tool if native => Message {
                    role: "tool",
                    content: turn.content.clone(),
                    tool_calls: Vec::new(),
                    tool_name: turn.tool_name.clone(),
                },
                Role::Tool => text_message("user", render_tool_result(turn)),
            };
            messages.push(message);
        }

        ChatBody {
            model: request.model.clone(),
            messages,
            stream: true,
            options: Options {
                temperature: request.temperature,
            },
            tools: request
                .tools
                .iter()
                .map(|spec| ToolDefinition {
                    r#type: "function",
                    function: ToolFunctionDefinition {
                        name: spec.name.clone(),
                        description: spec.description.clone(),
                        parameters: spec.parameters.clone(),
                    },
                })
                .collect(),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn fetch_tags(&self) -> anyhow::Result<TagsResponse> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .authorize(build_probe_client(PROBE_TIMEOUT).get(&url))
            .send()
            .await
            .with_context(|| format!("Ollama at {} is unreachable", self.base_url))?;
        if !response.status().is_success() {
            anyhow::bail!(
                "Ollama at {} returned HTTP {}. Is `ollama serve` running?",
                self.base_url,
                response.status().as_u16()
            );
        }
        response
            .json::<TagsResponse>()
            .await
            .context("Ollama /api/tags returned invalid JSON")
    }
}

fn text_message(role: &'static str, content: String) -> Message {
    Message {
        role,
        content,
        tool_calls: Vec::new(),
        tool_name: None,
    }
}

impl Backend for OllamaBackend {
    fn profile_name(&self) -> &str {
        &self.profile
    }

    fn stream_chat(&self, request: ChatRequest, cancel: CancellationToken) -> ChatStream {
        let body = Self::build_body(&request);
        tracing::debug!(
            backend = self.profile,
            model = request.model,
            turns = request.turns.len(),
            "sending ollama chat request"
        );
        let send = self
            .authorize(self.client.post(self.chat_url()).json(&body))
            .send();
        stream_response(
            self.profile.clone(),
            send,
            NdjsonDecoder::default(),
            self.limits,
            cancel,
        )
    }

    fn health_check(&self) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            self.fetch_tags().await?;
            Ok(())
        })
    }

    fn list_models(&self) -> BackendFuture<'_, Vec<String>> {
        Box::pin(async move {
            let tags = self.fetch_tags().await?;
            Ok(tags.models.into_iter().map(|entry| entry.name).collect())
        })
    }
}

/// Decoder for newline-delimited JSON chat chunks.
#[derive(Default)]
pub struct NdjsonDecoder {
    buffer: SseBuffer,
    next_tool_index: u32,
}

impl NdjsonDecoder {
    fn decode_line(&mut self, line: &str, events: &mut Vec<ChatEvent>) {
        let chunk = match serde_json::from_str::<ChatChunk>(line) {
            Ok(chunk) => chunk,
            Err(error) => {
                tracing::warn!("Skipping undecodable ollama stream line: {error}");
                return;
            }
        };

        if let Some(error) = chunk.error {
            events.push(ChatEvent::ConnectionError(format!("ollama error: {error}")));
            return;
        }

        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
                events.push(ChatEvent::TextDelta(message.content));
            }
            // Ollama delivers each tool call whole; one fragment per call.
            for call in message.tool_calls {
                let arguments_delta = match call.function.arguments {
                    Value::Null => String::new(),
                    Value::String(raw) => raw,
                    other => other.to_string(),
                };
                events.push(ChatEvent::ToolCallDelta(ToolCallFragment {
                    index: self.next_tool_index,
                    id: call.id,
                    name: Some(call.function.name),
                    arguments_delta,
                }));
                self.next_tool_index += 1;
            }
        }

        if chunk.done {
            let reason = chunk
                .done_reason
                .as_deref()
                .map_or(FinishReason::Stop, FinishReason::from_wire);
            events.push(ChatEvent::Done(reason));
        }
    }
}

impl FrameDecoder for NdjsonDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<ChatEvent> {
        self.buffer.push_chunk(chunk);
        let mut events = Vec::new();
        while let Some(line) = self.buffer.next_line() {
            if !line.trim().is_empty() {
                self.decode_line(&line, &mut events);
            }
        }
        events
    }

    fn finish(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        if let Some(rest) = self.buffer.take_remainder() {
            if serde_json::from_str::<Value>(&rest).is_err() {
                events.push(ChatEvent::ConnectionError(format!(
                    "malformed final response line: {}",
                    crate::utils::truncate_with_ellipsis(&rest, 120)
                )));
                return events;
            }
            self.decode_line(&rest, &mut events);
        }
        events
    }
}
