mod types;

use self::types::{
    ChatBody, ChatCompletionChunk, Message, MessageToolCall, MessageToolFunction, ModelsResponse,
    ToolDefinition, ToolFunctionDefinition,
};
use super::http_client::{build_backend_client, build_probe_client};
use super::sse::{SseBuffer, is_done_marker, parse_data_lines};
use super::streaming::{ChatEvent, ChatStream, FinishReason, ToolCallFragment};
use super::tool_protocol::render_tool_result;
use super::traits::{Backend, BackendFuture};
use super::transport::{FrameDecoder, StreamLimits, stream_response};
use super::types::{ChatRequest, Role, Turn};
use anyhow::Context;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connector for OpenAI-compatible `/v1/chat/completions` servers
/// (vLLM, llama.cpp server, LM Studio, hosted gateways).
pub struct OpenAiCompatibleBackend {
    profile: String,
    chat_url: String,
    models_url: String,
    api_key: Option<String>,
    limits: StreamLimits,
    client: Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        profile: impl Into<String>,
        endpoint: &str,
        api_key: Option<String>,
        limits: StreamLimits,
    ) -> Self {
        let (chat_url, models_url) = resolve_urls(endpoint);
        Self {
            profile: profile.into(),
            chat_url,
            models_url,
            api_key,
            limits,
            client: build_backend_client(),
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    fn build_body(request: &ChatRequest) -> ChatBody {
        let native = !request.tools.is_empty();
        let mut messages = Vec::with_capacity(request.turns.len() + 1);

        if let Some(system) = &request.system {
            messages.push(text_message("system", system.clone()));
        }

        for turn in &request.turns {
            messages.push(match turn.role {
                Role::User => text_message("user", turn.content.clone()),
                Role::Assistant if native && !turn.tool_calls.is_empty() => {
                    assistant_with_calls(turn)
                }
                Role::Assistant => text_message("assistant", turn.content.clone()),
                Role::Tool if native => Message {
                    role: "tool",
                    content: Some(turn.content.clone()),
                    tool_call_id: turn.tool_call_id.clone(),
                    tool_calls: None,
                },
                Role::Tool => text_message("user", render_tool_result(turn)),
            });
        }

        let tools = native.then(|| {
            request
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
                .collect()
        });

        ChatBody {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            stream: true,
            tools,
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

fn resolve_urls(endpoint: &str) -> (String, String) {
    let base = endpoint.trim_end_matches('/');
    if let Some(prefix) = base.strip_suffix("chat/completions") {
        return (base.to_string(), format!("{prefix}models"));
    }
    if base.ends_with("/v1") {
        return (
            format!("{base}/chat/completions"),
            format!("{base}/models"),
        );
    }
    (
        format!("{base}/v1/chat/completions"),
        format!("{base}/v1/models"),
    )
}

fn text_message(role: &'static str, content: String) -> Message {
    Message {
        role,
        content: Some(content),
        tool_call_id: None,
        tool_calls: None,
    }
}

fn assistant_with_calls(turn: &Turn) -> Message {
    Message {
        role: "assistant",
        content: (!turn.content.is_empty()).then(|| turn.content.clone()),
        tool_call_id: None,
        tool_calls: Some(
            turn.tool_calls
                .iter()
                .map(|call| MessageToolCall {
                    id: call.id.clone(),
                    r#type: "function",
                    function: MessageToolFunction {
                        name: call.name.clone(),
                        arguments: Value::Object(call.arguments.clone()).to_string(),
                    },
                })
                .collect(),
        ),
    }
}

impl Backend for OpenAiCompatibleBackend {
    fn profile_name(&self) -> &str {
        &self.profile
    }

    fn stream_chat(&self, request: ChatRequest, cancel: CancellationToken) -> ChatStream {
        let body = Self::build_body(&request);
        tracing::debug!(
            backend = self.profile,
            model = request.model,
            turns = request.turns.len(),
            "sending chat completions request"
        );
        let send = self
            .authorize(self.client.post(&self.chat_url).json(&body))
            .send();
        stream_response(
            self.profile.clone(),
            send,
            SseDecoder::default(),
            self.limits,
            cancel,
        )
    }

    fn health_check(&self) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            self.list_models().await?;
            Ok(())
        })
    }

    fn list_models(&self) -> BackendFuture<'_, Vec<String>> {
        Box::pin(async move {
            let response = self
                .authorize(build_probe_client(PROBE_TIMEOUT).get(&self.models_url))
                .send()
                .await
                .with_context(|| format!("{} is unreachable", self.models_url))?;
            if !response.status().is_success() {
                anyhow::bail!(
                    "{} returned HTTP {}",
                    self.models_url,
                    response.status().as_u16()
                );
            }
            let models = response
                .json::<ModelsResponse>()
                .await
                .context("model listing returned invalid JSON")?;
            Ok(models.data.into_iter().map(|entry| entry.id).collect())
        })
    }
}

/// Decoder for `text/event-stream` chat completion chunks.
#[derive(Default)]
pub struct SseDecoder {
    buffer: SseBuffer,
}

impl SseDecoder {
    fn decode_block(block: &str, events: &mut Vec<ChatEvent>) {
        for data in parse_data_lines(block) {
            if is_done_marker(data) {
                events.push(ChatEvent::Done(FinishReason::Stop));
                return;
            }
            let Ok(chunk) = serde_json::from_str::<ChatCompletionChunk>(data) else {
                tracing::warn!("Skipping undecodable SSE data line");
                continue;
            };

            if let Some(error) = chunk.error {
                events.push(ChatEvent::ConnectionError(format!(
                    "backend error: {}",
                    error.message
                )));
                return;
            }

            for choice in chunk.choices {
                if let Some(delta) = choice.delta {
                    if let Some(content) = delta.content
                        && !content.is_empty()
                    {
                        events.push(ChatEvent::TextDelta(content));
                    }
                    for tool_call in delta.tool_calls.unwrap_or_default() {
                        let (name, arguments) = tool_call
                            .function
                            .map_or((None, None), |f| (f.name, f.arguments));
                        events.push(ChatEvent::ToolCallDelta(ToolCallFragment {
                            index: tool_call.index,
                            id: tool_call.id,
                            name,
                            arguments_delta: arguments.unwrap_or_default(),
                        }));
                    }
                }
                if let Some(finish) = choice.finish_reason.as_deref() {
                    events.push(ChatEvent::Done(FinishReason::from_wire(finish)));
                    return;
                }
            }
        }
    }
}

impl FrameDecoder for SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<ChatEvent> {
        self.buffer.push_chunk(chunk);
        let mut events = Vec::new();
        while let Some(block) = self.buffer.next_event_block() {
            Self::decode_block(&block, &mut events);
        }
        events
    }

    fn finish(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        if let Some(rest) = self.buffer.take_remainder() {
            Self::decode_block(&rest, &mut events);
        }
        events
    }
}
