use crate::scripted_backend::{Script, ScriptedBackend};
use camel::agent::{AgentLoop, AgentSession, LoopSettings};
use camel::config::{BackendApi, BackendConfig};
use camel::llm::{Backend, BackendSwitchManager, NullStreamSink, StreamLimits};
use camel::tools::{TodoTool, Tool, ToolRegistry};
use serde_json::json;
use std::sync::Arc;

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

fn add_todo(task: &str) -> Script {
    Script::tagged_calls(&[("todo", json!({"action": "add", "task": task}))])
}

fn session(
    registry: &Arc<ToolRegistry>,
    backends: &Arc<BackendSwitchManager>,
) -> AgentSession {
    let agent = AgentLoop::new(
        Arc::clone(registry),
        LoopSettings {
            turn_budget: 5,
            temperature: 0.0,
            history_limit: 0,
        },
    );
    AgentSession::new(
        agent,
        Arc::clone(backends),
        std::env::temp_dir(),
        None,
        Arc::new(NullStreamSink),
    )
}

#[tokio::test]
async fn todo_lists_are_scoped_to_their_session() {
    let todo = Arc::new(TodoTool::new());
    let mut registry = ToolRegistry::default();
    registry.register(Arc::clone(&todo) as Arc<dyn Tool>).unwrap();
    let registry = Arc::new(registry);

    let backend: Arc<dyn Backend> = Arc::new(ScriptedBackend::new(
        "scripted",
        vec![
            add_todo("index the docs"),
            Script::text("noted"),
            add_todo("write the parser"),
            Script::text("noted"),
        ],
    ));
    let backends = Arc::new(
        BackendSwitchManager::with_factory(
            vec![profile()],
            "scripted",
            StreamLimits::default(),
            Arc::new(move |_profile: &BackendConfig, _limits: StreamLimits| {
                Arc::clone(&backend)
            }),
        )
        .unwrap(),
    );

    let mut first = session(&registry, &backends);
    let mut second = session(&registry, &backends);
    assert_ne!(first.session_id(), second.session_id());

    first.submit("plan the docs work").await;
    second.submit("plan the parser work").await;

    let first_items = todo.items(first.session_id());
    let second_items = todo.items(second.session_id());
    assert_eq!(first_items.len(), 1);
    assert_eq!(first_items[0].task, "index the docs");
    assert_eq!(second_items.len(), 1);
    assert_eq!(second_items[0].task, "write the parser");

    // clearing starts a fresh list and releases the old one
    let old_id = first.session_id().to_string();
    first.clear();
    assert_ne!(first.session_id(), old_id);
    assert!(todo.items(&old_id).is_empty());
    assert!(todo.items(first.session_id()).is_empty());
    assert_eq!(todo.items(second.session_id()).len(), 1);

    // dropped sessions leave nothing behind
    drop(second);
    assert_eq!(todo.session_count(), 0);
}
