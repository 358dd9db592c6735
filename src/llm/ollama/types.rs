use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(super) struct ChatBody {
    pub(super) model: String,
    pub(super) messages: Vec<Message>,
    pub(super) stream: bool,
    pub(super) options: Options,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(super) tools: Vec<ToolDefinition>,
}

#[derive(Debug, Serialize)]
pub(super) struct Options {
    pub(super) temperature: f64,
}

#[derive(Debug, Serialize)]
pub(super) struct Message {
    pub(super) role: &'static str,
    pub(super) content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(super) tool_calls: Vec<MessageToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) tool_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct MessageToolCall {
    pub(super) function: MessageToolFunction,
}

#[derive(Debug, Serialize)]
pub(super) struct MessageToolFunction {
    pub(super) name: String,
    pub(super) arguments: Value,
}

#[derive(Debug, Serialize)]
pub(super) struct ToolDefinition {
    pub(super) r#type: &'static str,
    pub(super) function: ToolFunctionDefinition,
}

#[derive(Debug, Serialize)]
pub(super) struct ToolFunctionDefinition {
    pub(super) name: String,
    pub(super) description: String,
    pub(super) parameters: Value,
}

/// One NDJSON line of a streamed `/api/chat` response.
#[derive(Debug, Deserialize)]
pub(super) struct ChatChunk {
    #[serde(default)]
    pub(super) message: Option<ChunkMessage>,
    #[serde(default)]
    pub(super) done: bool,
    #[serde(default)]
    pub(super) done_reason: Option<String>,
    #[serde(default)]
    pub(super) error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChunkMessage {
    #[serde(default)]
    pub(super) content: String,
    #[serde(default)]
    pub(super) tool_calls: Vec<ChunkToolCall>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChunkToolCall {
    #[serde(default)]
    pub(super) id: Option<String>,
    pub(super) function: ChunkToolFunction,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChunkToolFunction {
    pub(super) name: String,
    #[serde(default)]
    pub(super) arguments: Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct TagsResponse {
    #[serde(default)]
    pub(super) models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TagEntry {
    pub(super) name: String,
}
