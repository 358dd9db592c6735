use crate::scripted_backend::{Script, ScriptedBackend};
use camel::agent::{AgentLoop, AgentSession, LoopSettings, LoopState, SessionControl, TurnOutcome};
use camel::config::{BackendApi, BackendConfig};
use camel::llm::{
    Backend, BackendFactory, BackendSwitchManager, ChatEvent, NullStreamSink, StreamLimits,
};
use camel::tools::ToolRegistry;
use std::collections::HashMap;
use std::sync::Arc;

fn profile(name: &str) -> BackendConfig {
    BackendConfig {
        name: name.into(),
        endpoint: format!("http://{name}.invalid"),
        model: format!("{name}-model"),
        api: BackendApi::Ollama,
        is_default: name == "a",
        native_tools: false,
        api_key_env: None,
    }
}

struct Fixture {
    session: AgentSession,
    a: Arc<ScriptedBackend>,
    b: Arc<ScriptedBackend>,
}

fn fixture(a: ScriptedBackend, b: ScriptedBackend) -> Fixture {
    let a = Arc::new(a);
    let b = Arc::new(b);
    let by_name: HashMap<String, Arc<dyn Backend>> = HashMap::from([
        ("a".to_string(), Arc::clone(&a) as Arc<dyn Backend>),
        ("b".to_string(), Arc::clone(&b) as Arc<dyn Backend>),
    ]);
    let factory: BackendFactory =
        Arc::new(move |profile: &BackendConfig, _limits: StreamLimits| {
            Arc::clone(&by_name[&profile.name])
        });
    let backends = BackendSwitchManager::with_factory(
        vec![profile("a"), profile("b")],
        "a",
        StreamLimits::default(),
        factory,
    )
    .unwrap();

    let agent = AgentLoop::new(
        Arc::new(ToolRegistry::default()),
        LoopSettings {
            turn_budget: 10,
            temperature: 0.0,
            history_limit: 0,
        },
    );
    let workspace = std::env::temp_dir();
    let session = AgentSession::new(
        agent,
        Arc::new(backends),
        workspace,
        None,
        Arc::new(NullStreamSink),
    );
    Fixture { session, a, b }
}

#[tokio::test]
async fn switch_while_awaiting_model_discards_the_exchange() {
    let Fixture { mut session, a, b } = fixture(
        ScriptedBackend::new(
            "a",
            vec![
                Script::text("hello from a"),
                Script::Stall(vec![ChatEvent::TextDelta("partial ans".into())]),
            ],
        ),
        ScriptedBackend::new("b", vec![Script::text("hello from b")]),
    );

    let first = session.submit("hi").await;
    assert!(first.outcome.is_committed());
    let committed = session.conversation().len();

    let handle = session.handle();
    let mut states = session.agent().subscribe();
    let (report, ()) = tokio::join!(session.submit("tell me more"), async {
        states
            .wait_for(|state| *state == LoopState::AwaitingModel)
            .await
            .unwrap();
        assert!(handle.send(SessionControl::SwitchBackend("b".into())));
    });

    let TurnOutcome::Cancelled { reason } = &report.outcome else {
        panic!("expected cancellation, got {:?}", report.outcome);
    };
    assert!(reason.contains("switched backend to b"));
    assert_eq!(session.conversation().len(), committed);
    assert_eq!(session.active_profile().name, "b");
    assert_eq!(session.agent().state(), LoopState::Idle);
    assert_eq!(session.last_failed_input(), Some("tell me more"));

    // the interrupted input can be replayed against the new backend
    let retried = session.retry().await.unwrap();
    assert_eq!(
        retried.outcome,
        TurnOutcome::Completed {
            text: "hello from b".into()
        }
    );
    assert_eq!(a.request_count(), 2);
    assert_eq!(b.request_count(), 1);
    // history from backend a travels with the conversation
    assert_eq!(b.requests()[0].turns.len(), committed + 1);
}

#[tokio::test]
async fn abort_cancels_without_switching() {
    let Fixture { mut session, .. } = fixture(
        ScriptedBackend::new("a", vec![Script::Stall(Vec::new())]),
        ScriptedBackend::new("b", Vec::new()),
    );

    let handle = session.handle();
    let mut states = session.agent().subscribe();
    let (report, ()) = tokio::join!(session.submit("slow question"), async {
        states
            .wait_for(|state| *state == LoopState::AwaitingModel)
            .await
            .unwrap();
        assert!(handle.abort());
    });

    assert_eq!(
        report.outcome,
        TurnOutcome::Cancelled {
            reason: "aborted by user".into()
        }
    );
    assert!(session.conversation().is_empty());
    assert_eq!(session.active_profile().name, "a");
}

#[tokio::test]
async fn retried_exchange_honours_the_interrupt_signal() {
    let Fixture { mut session, a, .. } = fixture(
        ScriptedBackend::repeating("a", Script::Stall(Vec::new())),
        ScriptedBackend::new("b", Vec::new()),
    );
    let mut states = session.agent().subscribe();

    let (first_signal, first_rx) = tokio::sync::oneshot::channel::<()>();
    let interrupt = session.handle().abort_on(first_rx);
    let (report, ()) = tokio::join!(session.submit("slow question"), async {
        states
            .wait_for(|state| *state == LoopState::AwaitingModel)
            .await
            .unwrap();
        first_signal.send(()).unwrap();
    });
    interrupt.abort();
    assert!(matches!(report.outcome, TurnOutcome::Cancelled { .. }));
    assert_eq!(session.last_failed_input(), Some("slow question"));

    // the replay stalls too and must be interruptible the same way
    let (retry_signal, retry_rx) = tokio::sync::oneshot::channel::<()>();
    let interrupt = session.handle().abort_on(retry_rx);
    let (retried, ()) = tokio::join!(session.retry(), async {
        states
            .wait_for(|state| *state == LoopState::AwaitingModel)
            .await
            .unwrap();
        retry_signal.send(()).unwrap();
    });
    interrupt.abort();

    assert_eq!(
        retried.unwrap().outcome,
        TurnOutcome::Cancelled {
            reason: "aborted by user".into()
        }
    );
    assert_eq!(a.request_count(), 2);
    assert!(session.conversation().is_empty());
    assert_eq!(session.last_failed_input(), Some("slow question"));
}

#[tokio::test]
async fn idle_session_accepts_switches() {
    let Fixture { session, .. } = fixture(
        ScriptedBackend::new("a", Vec::new()),
        ScriptedBackend::new("b", Vec::new()),
    );

    let profile = session.switch_backend("b").unwrap();
    assert_eq!(profile.model, "b-model");
    assert!(session.switch_backend("nope").is_err());

    let profile = session.switch_model("b-large").unwrap();
    assert_eq!(profile.model, "b-large");
    assert_eq!(session.active_profile().model, "b-large");
}
