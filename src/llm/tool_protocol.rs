use super::types::{ToolCall, Turn};
use crate::tools::ToolSpec;
use serde_json::{Map, Value};
use std::fmt::Write;

const TOOL_CALL_OPEN_TAG: &str = "<tool_call>";
const TOOL_CALL_CLOSE_TAG: &str = "</tool_call>";
const TOOL_FENCE_OPEN: &str = "```tool";
const FENCE: &str = "```";

/// Result of scanning model text for tool-call directives.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    TextOnly,
    ToolCalls(Vec<ToolCall>),
    /// Something that looked like a directive but could not be decoded.
    /// Callers treat this exactly like `TextOnly`.
    Malformed { reason: String },
}

impl ParseOutcome {
    pub fn into_calls(self) -> Vec<ToolCall> {
        match self {
            Self::ToolCalls(calls) => calls,
            Self::TextOnly | Self::Malformed { .. } => Vec::new(),
        }
    }
}

/// One text convention for embedding tool calls in model output.
pub trait ToolCallParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, text: &str) -> ParseOutcome;
}

/// `<tool_call>{"name": "...", "arguments": {...}}</tool_call>` blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct TaggedJsonParser;

impl ToolCallParser for TaggedJsonParser {
    fn name(&self) -> &'static str {
        "tagged_json"
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let mut calls = Vec::new();
        let mut problems = Vec::new();
        let mut search_start = 0;

        while let Some(open_offset) = text[search_start..].find(TOOL_CALL_OPEN_TAG) {
            let content_start = search_start + open_offset + TOOL_CALL_OPEN_TAG.len();
            let Some(close_offset) = text[content_start..].find(TOOL_CALL_CLOSE_TAG) else {
                problems.push("unterminated <tool_call> block".to_string());
                break;
            };
            let close_index = content_start + close_offset;

            match parse_tagged_block(&text[content_start..close_index]) {
                Ok((name, arguments)) => calls.push(ToolCall {
                    id: format!("call_{}", calls.len() + 1),
                    name,
                    arguments,
                }),
                Err(reason) => problems.push(reason),
            }
            search_start = close_index + TOOL_CALL_CLOSE_TAG.len();
        }

        finish_outcome(self.name(), calls, problems)
    }
}

fn parse_tagged_block(block: &str) -> Result<(String, Map<String, Value>), String> {
    let parsed = serde_json::from_str::<Value>(block.trim())
        .map_err(|error| format!("tool call JSON: {error}"))?;
    let name = parsed
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| "tool call without a string name field".to_string())?;
    let arguments = match parsed.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        // Some models double-encode the arguments object.
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => return Err(format!("tool call '{name}': arguments must be an object")),
        },
        Some(_) => return Err(format!("tool call '{name}': arguments must be an object")),
    };
    Ok((name.to_string(), arguments))
}

/// Fenced ```` ```tool ```` blocks holding `{"tool": "...", ...flat arguments}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FencedToolParser;

impl ToolCallParser for FencedToolParser {
    fn name(&self) -> &'static str {
        "fenced_tool"
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let mut calls = Vec::new();
        let mut problems = Vec::new();
        let mut search_start = 0;

        while let Some(open_offset) = text[search_start..].find(TOOL_FENCE_OPEN) {
            let tag_end = search_start + open_offset + TOOL_FENCE_OPEN.len();
            // Only a bare `tool` info string counts; ```toolbox is ordinary code.
            let Some(line_end) = text[tag_end..].find('\n') else {
                problems.push("unterminated ```tool block".to_string());
                break;
            };
            if !text[tag_end..tag_end + line_end].trim().is_empty() {
                search_start = tag_end;
                continue;
            }
            let content_start = tag_end + line_end + 1;
            let Some(close_offset) = text[content_start..].find(FENCE) else {
                problems.push("unterminated ```tool block".to_string());
                break;
            };
            let close_index = content_start + close_offset;

            match parse_fenced_block(&text[content_start..close_index]) {
                Ok((name, arguments)) => calls.push(ToolCall {
                    id: format!("call_{}", calls.len() + 1),
                    name,
                    arguments,
                }),
                Err(reason) => problems.push(reason),
            }
            search_start = close_index + FENCE.len();
        }

        finish_outcome(self.name(), calls, problems)
    }
}

fn parse_fenced_block(block: &str) -> Result<(String, Map<String, Value>), String> {
    let parsed = serde_json::from_str::<Value>(block.trim())
        .map_err(|error| format!("tool block JSON: {error}"))?;
    let Value::Object(mut fields) = parsed else {
        return Err("tool block must be a JSON object".to_string());
    };
    let name = match fields.remove("tool") {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        _ => return Err("tool block without a string \"tool\" field".to_string()),
    };
    if fields.len() == 1
        && let Some(Value::Object(nested)) = fields.get("arguments")
    {
        return Ok((name, nested.clone()));
    }
    Ok((name, fields))
}

fn finish_outcome(parser: &str, calls: Vec<ToolCall>, problems: Vec<String>) -> ParseOutcome {
    for problem in &problems {
        tracing::warn!(parser, "Treating malformed tool call block as text: {problem}");
    }
    if !calls.is_empty() {
        ParseOutcome::ToolCalls(calls)
    } else if let Some(reason) = problems.into_iter().next() {
        ParseOutcome::Malformed { reason }
    } else {
        ParseOutcome::TextOnly
    }
}

/// Tries each parser in order; the first one that finds calls wins.
pub struct CompositeParser {
    parsers: Vec<Box<dyn ToolCallParser>>,
}

impl CompositeParser {
    pub fn new(parsers: Vec<Box<dyn ToolCallParser>>) -> Self {
        Self { parsers }
    }
}

impl Default for CompositeParser {
    fn default() -> Self {
        Self::new(vec![Box::new(TaggedJsonParser), Box::new(FencedToolParser)])
    }
}

impl ToolCallParser for CompositeParser {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn parse(&self, text: &str) -> ParseOutcome {
        let mut first_malformed = None;
        for parser in &self.parsers {
            match parser.parse(text) {
                ParseOutcome::ToolCalls(calls) => return ParseOutcome::ToolCalls(calls),
                malformed @ ParseOutcome::Malformed { .. } => {
                    first_malformed.get_or_insert(malformed);
                }
                ParseOutcome::TextOnly => {}
            }
        }
        first_malformed.unwrap_or(ParseOutcome::TextOnly)
    }
}

#[must_use]
pub fn augment_system_prompt(system_prompt: &str, tools: &[ToolSpec]) -> String {
    let mut augmented = String::from(system_prompt);
    augmented.push_str("\n\n## Available Tools\n\n");
    augmented.push_str("To use a tool, respond with exactly this format:\n");
    augmented.push_str("<tool_call>\n");
    augmented.push_str("{\"name\": \"tool_name\", \"arguments\": {...}}\n");
    augmented.push_str("</tool_call>\n\n");
    augmented.push_str(
        "You may use multiple tool calls in a single response. They run in order. \
         Results come back as <tool_result> blocks; continue from there.\n\n",
    );
    augmented.push_str("Available tools:\n");

    if tools.is_empty() {
        augmented.push_str("- (none)\n");
        return augmented;
    }

    for tool in tools {
        let parameters = match serde_json::to_string(&tool.parameters) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(
                    tool = tool.name,
                    "Failed to serialize tool parameters: {error}"
                );
                "{}".to_string()
            }
        };

        let _ = writeln!(
            augmented,
            "- {}: {} Parameters: {}",
            tool.name, tool.description, parameters
        );
    }

    augmented
}

/// Text form of a `tool` turn for backends that only see the text protocol.
pub fn render_tool_result(turn: &Turn) -> String {
    let status = if turn.is_error { "error" } else { "ok" };
    format!(
        "<tool_result name=\"{}\" id=\"{}\" status=\"{status}\">\n{}\n</tool_result>",
        turn.tool_name.as_deref().unwrap_or("unknown"),
        turn.tool_call_id.as_deref().unwrap_or(""),
        turn.content
    )
}
