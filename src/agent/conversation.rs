use crate::llm::{Role, ToolCall, Turn};
use crate::tools::ToolResult;
use std::collections::HashSet;

/// Committed turns of one session. Only grows, one whole exchange at a time.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a finished exchange.
    pub fn commit(&mut self, draft: ExchangeDraft) {
        debug_assert!(check_tool_links(&draft.turns).is_ok());
        self.turns.extend(draft.turns);
    }

    /// Drop every committed turn (the `/clear` command).
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    /// Text of the most recent assistant turn that has any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .filter(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.content.as_str())
            .find(|text| !text.trim().is_empty())
    }

    /// Committed turns sent with the next request.
    ///
    /// With a non-zero `history_limit` only the newest turns are kept, and the
    /// window is moved forward to start on a user turn so tool turns never
    /// lose the assistant turn they answer.
    pub fn request_window(&self, history_limit: usize) -> &[Turn] {
        if history_limit == 0 || self.turns.len() <= history_limit {
            return &self.turns;
        }
        let start = self.turns.len() - history_limit;
        let aligned = self.turns[start..]
            .iter()
            .position(|turn| turn.role == Role::User)
            .map_or(self.turns.len(), |offset| start + offset);
        &self.turns[aligned..]
    }

    /// Plain-text rendering used by the copy commands.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            if !out.is_empty() {
                out.push('\n');
            }
            let label = match turn.role {
                Role::User => "You".to_string(),
                Role::Assistant => "Camel".to_string(),
                Role::Tool => format!("Tool {}", turn.tool_name.as_deref().unwrap_or("unknown")),
            };
            out.push_str(&format!("{label}: {}\n", turn.content));
        }
        out
    }
}

/// Turns of the exchange in progress, layered over the committed conversation.
#[derive(Debug, Clone)]
pub struct ExchangeDraft {
    turns: Vec<Turn>,
}

impl ExchangeDraft {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(user_input)],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn push_assistant(&mut self, text: impl Into<String>, calls: Vec<ToolCall>) {
        self.turns.push(Turn::assistant(text, calls));
    }

    pub fn push_tool(&mut self, call: &ToolCall, result: &ToolResult) {
        self.turns.push(Turn::tool(call, result));
    }
}

/// Check that each tool turn answers a call from the nearest preceding
/// assistant turn, and that every such call is answered exactly once.
pub fn check_tool_links(turns: &[Turn]) -> Result<(), String> {
    let mut open: Option<(usize, HashSet<&str>)> = None;

    for (index, turn) in turns.iter().enumerate() {
        match turn.role {
            Role::Assistant => {
                if let Some((at, pending)) = &open
                    && !pending.is_empty()
                {
                    return Err(format!("assistant turn {at} has unanswered tool calls"));
                }
                let ids: HashSet<&str> = turn.tool_calls.iter().map(|c| c.id.as_str()).collect();
                if ids.len() != turn.tool_calls.len() {
                    return Err(format!("assistant turn {index} repeats a tool call id"));
                }
                open = Some((index, ids));
            }
            Role::Tool => {
                let id = turn.tool_call_id.as_deref().unwrap_or_default();
                let answered = open
                    .as_mut()
                    .is_some_and(|(_, pending)| pending.remove(id));
                if !answered {
                    return Err(format!("tool turn {index} references unknown call '{id}'"));
                }
            }
            Role::User => {
                if let Some((at, pending)) = &open
                    && !pending.is_empty()
                {
                    return Err(format!("assistant turn {at} has unanswered tool calls"));
                }
                open = None;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolPayload;
    use serde_json::Map;
    use std::time::Duration;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: Map::new(),
        }
    }

    fn exchange(input: &str) -> ExchangeDraft {
        let first = call("call_1", "glob");
        let mut draft = ExchangeDraft::new(input);
        draft.push_assistant("looking", vec![first.clone()]);
        draft.push_tool(
            &first,
            &ToolResult::ok("call_1", ToolPayload::text("a.rs"), Duration::ZERO),
        );
        draft.push_assistant("done", Vec::new());
        draft
    }

    #[test]
    fn commit_appends_whole_exchange() {
        let mut conversation = Conversation::new();
        conversation.commit(exchange("find files"));
        assert_eq!(conversation.len(), 4);
        assert_eq!(conversation.last_assistant_text(), Some("done"));
        assert!(check_tool_links(conversation.turns()).is_ok());
    }

    #[test]
    fn window_starts_at_a_user_turn() {
        let mut conversation = Conversation::new();
        conversation.commit(exchange("one"));
        conversation.commit(exchange("two"));

        assert_eq!(conversation.request_window(0).len(), 8);
        // The five newest turns start mid-exchange; the window slides to "two".
        let window = conversation.request_window(5);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "two");
    }

    #[test]
    fn transcript_labels_roles() {
        let mut conversation = Conversation::new();
        conversation.commit(exchange("find files"));
        let transcript = conversation.transcript();
        assert!(transcript.starts_with("You: find files\n"));
        assert!(transcript.contains("Tool glob: a.rs\n"));
        assert!(transcript.ends_with("Camel: done\n"));
    }

    #[test]
    fn dangling_tool_turn_is_rejected() {
        let orphan = call("call_9", "read");
        let turns = vec![
            Turn::user("hi"),
            Turn::assistant("", vec![call("call_1", "read")]),
            Turn::tool(
                &orphan,
                &ToolResult::error("call_9", "nope", Duration::ZERO),
            ),
        ];
        assert!(check_tool_links(&turns).unwrap_err().contains("call_9"));
    }

    #[test]
    fn unanswered_call_is_rejected() {
        let turns = vec![
            Turn::user("hi"),
            Turn::assistant("", vec![call("call_1", "read")]),
            Turn::assistant("moving on", Vec::new()),
        ];
        assert!(check_tool_links(&turns).is_err());
    }
}
