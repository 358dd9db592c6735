use crate::scripted_backend::{Script, ScriptedBackend};
use camel::agent::{
    AgentLoop, Conversation, ExchangeParams, LoopSettings, TurnOutcome, check_tool_links,
};
use camel::config::{BackendApi, BackendConfig};
use camel::llm::{NullStreamSink, Role};
use camel::tools::{FileReadTool, ToolContext, ToolPayload, ToolRegistry};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn profile() -> BackendConfig {
    BackendConfig {
        name: "scripted".into(),
        endpoint: "http://127.0.0.1:9".into(),
        model: "scripted".into(),
        api: BackendApi::Ollama,
        is_default: true,
        native_tools: false,
        api_key_env: None,
    }
}

fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::default();
    registry
        .register_handler(
            "echo",
            "echo text back",
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
            |args, _ctx| async move {
                Ok(ToolPayload::text(
                    args["text"].as_str().unwrap_or_default().to_string(),
                ))
            },
        )
        .unwrap();
    registry.register(Arc::new(FileReadTool)).unwrap();
    Arc::new(registry)
}

fn agent(turn_budget: u32) -> AgentLoop {
    AgentLoop::new(
        registry(),
        LoopSettings {
            turn_budget,
            temperature: 0.0,
            history_limit: 0,
        },
    )
}

async fn run(
    agent: &AgentLoop,
    backend: &ScriptedBackend,
    conversation: &mut Conversation,
    workspace: &std::path::Path,
    input: &str,
) -> camel::agent::ExchangeReport {
    let profile = profile();
    let ctx = ToolContext::new(workspace);
    let cancel = CancellationToken::new();
    agent
        .run_exchange(
            conversation,
            ExchangeParams {
                backend,
                profile: &profile,
                system_prompt: "You are a test agent.",
                user_input: input,
                ctx: &ctx,
                sink: &NullStreamSink,
                cancel: &cancel,
            },
        )
        .await
}

#[tokio::test]
async fn endless_tool_requests_stop_at_turn_budget() {
    let workspace = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::repeating(
        "scripted",
        Script::tagged_calls(&[("echo", json!({"text": "again"}))]),
    );
    let agent = agent(5);
    let mut conversation = Conversation::new();

    let report = run(&agent, &backend, &mut conversation, workspace.path(), "loop forever").await;

    let TurnOutcome::Truncated { text } = &report.outcome else {
        panic!("expected truncation, got {:?}", report.outcome);
    };
    assert!(text.contains("turn budget of 5"));
    assert_eq!(report.rounds, 5);
    assert_eq!(report.tool_calls, 5);
    assert_eq!(backend.request_count(), 5);

    // user, five assistant/tool pairs, then the notice
    assert_eq!(conversation.len(), 12);
    assert_eq!(conversation.last_assistant_text(), Some(text.as_str()));
    check_tool_links(conversation.turns()).unwrap();
}

#[tokio::test]
async fn every_call_in_a_response_gets_an_ordered_result() {
    let workspace = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new(
        "scripted",
        vec![
            Script::tagged_calls(&[
                ("delete", json!({"path": "everything"})),
                ("read", json!({"path": "missing.txt"})),
                ("echo", json!({"text": "still here"})),
            ]),
            Script::text("Two of those failed."),
        ],
    );
    let agent = agent(10);
    let mut conversation = Conversation::new();

    let report = run(&agent, &backend, &mut conversation, workspace.path(), "do three things").await;

    assert_eq!(
        report.outcome,
        TurnOutcome::Completed {
            text: "Two of those failed.".into()
        }
    );
    assert_eq!(report.rounds, 2);
    assert_eq!(report.tool_calls, 3);

    let turns = conversation.turns();
    assert_eq!(turns.len(), 6);
    assert_eq!(turns[1].role, Role::Assistant);
    let calls = &turns[1].tool_calls;
    assert_eq!(calls.len(), 3);

    let results = &turns[2..5];
    for (call, result) in calls.iter().zip(results) {
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some(call.id.as_str()));
        assert_eq!(result.tool_name.as_deref(), Some(call.name.as_str()));
    }
    assert!(results[0].is_error);
    assert!(results[0].content.contains("unknown_tool"));
    assert!(results[1].is_error);
    assert!(results[1].content.contains("file not found"));
    assert!(!results[2].is_error);
    assert_eq!(results[2].content, "still here");
    check_tool_links(turns).unwrap();

    // the second request carried every tool result back to the model
    let second = &backend.requests()[1];
    assert_eq!(second.turns.len(), 5);
}

#[tokio::test]
async fn connection_failure_leaves_history_untouched() {
    let workspace = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new(
        "scripted",
        vec![
            Script::text("first answer"),
            Script::tagged_calls(&[("echo", json!({"text": "x"}))]),
            Script::connection_error("connection refused"),
        ],
    );
    let agent = agent(10);
    let mut conversation = Conversation::new();

    let first = run(&agent, &backend, &mut conversation, workspace.path(), "hello").await;
    assert!(first.outcome.is_committed());
    let before = conversation.turns().to_vec();

    let second = run(&agent, &backend, &mut conversation, workspace.path(), "use a tool").await;

    assert_eq!(
        second.outcome,
        TurnOutcome::ConnectionFailed {
            detail: "connection refused".into()
        }
    );
    assert_eq!(second.tool_calls, 1);
    assert_eq!(conversation.turns(), before.as_slice());
}

#[tokio::test]
async fn native_calls_skip_text_parsing() {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::write(workspace.path().join("notes.txt"), "remember the milk\n").unwrap();
    let backend = ScriptedBackend::new(
        "scripted",
        vec![
            Script::native_call("abc", "read", r#"{"path": "notes.txt"}"#),
            Script::text("It says to remember the milk."),
        ],
    );
    let agent = agent(10);
    let mut conversation = Conversation::new();

    let report = run(&agent, &backend, &mut conversation, workspace.path(), "read my notes").await;

    assert!(matches!(report.outcome, TurnOutcome::Completed { .. }));
    let tool_turn = &conversation.turns()[2];
    assert_eq!(tool_turn.tool_call_id.as_deref(), Some("abc"));
    assert!(tool_turn.content.contains("remember the milk"));
}

#[tokio::test]
async fn malformed_tool_call_is_kept_as_plain_text() {
    let workspace = tempfile::tempdir().unwrap();
    let raw = "<tool_call>{not json}</tool_call>";
    let backend = ScriptedBackend::new("scripted", vec![Script::text(raw)]);
    let agent = agent(10);
    let mut conversation = Conversation::new();

    let report = run(&agent, &backend, &mut conversation, workspace.path(), "do something").await;

    assert_eq!(report.outcome, TurnOutcome::Completed { text: raw.into() });
    assert_eq!(report.rounds, 1);
    assert_eq!(report.tool_calls, 0);
    assert_eq!(backend.request_count(), 1);
    let turns = conversation.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].content, raw);
}
