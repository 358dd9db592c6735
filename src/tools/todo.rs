use super::common::{optional_str, optional_usize, required_str};
use super::traits::{Tool, ToolFuture};
use super::types::{ToolContext, ToolPayload};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TodoItem {
    pub id: usize,
    pub task: String,
    pub done: bool,
}

#[derive(Debug, Default)]
struct TodoList {
    items: Vec<TodoItem>,
    next_id: usize,
}

/// Task lists the model keeps for itself, one per agent session.
#[derive(Debug, Default)]
pub struct TodoTool {
    lists: Mutex<HashMap<String, TodoList>>,
}

impl TodoTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self, session_id: &str) -> Vec<TodoItem> {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .map(|list| list.items.clone())
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn apply(&self, session_id: &str, args: &Value) -> anyhow::Result<Value> {
        let action = required_str(args, "action")?;
        let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        let list = lists.entry(session_id.to_string()).or_default();

        match action {
            "add" => {
                let task = optional_str(args, "task")
                    .ok_or_else(|| anyhow::anyhow!("'add' requires a task"))?;
                list.next_id += 1;
                let id = list.next_id;
                list.items.push(TodoItem {
                    id,
                    task: task.to_string(),
                    done: false,
                });
            }
            "complete" | "remove" => {
                let id = optional_usize(args, "id")
                    .ok_or_else(|| anyhow::anyhow!("'{action}' requires an id"))?;
                let Some(pos) = list.items.iter().position(|item| item.id == id) else {
                    anyhow::bail!("no todo item with id {id}");
                };
                if action == "complete" {
                    list.items[pos].done = true;
                } else {
                    list.items.remove(pos);
                }
            }
            "clear" => list.items.clear(),
            "list" => {}
            other => anyhow::bail!("unknown action '{other}' (add, list, complete, remove, clear)"),
        }

        let pending = list.items.iter().filter(|item| !item.done).count();
        Ok(json!({
            "items": list.items,
            "pending": pending,
            "completed": list.items.len() - pending,
        }))
    }
}

impl Tool for TodoTool {
    fn name(&self) -> &str {
        "todo"
    }

    fn description(&self) -> &str {
        "Track a task list for the current session: add, list, complete, remove, clear"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["add", "list", "complete", "remove", "clear"]
                },
                "task": {"type": "string", "description": "Task text for 'add'"},
                "id": {"type": "integer", "description": "Item id for 'complete' and 'remove'"}
            },
            "required": ["action"],
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            self.apply(&ctx.session_id, &args)
                .map(ToolPayload::Structured)
        })
    }

    fn end_session(&self, session_id: &str) {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }
}
