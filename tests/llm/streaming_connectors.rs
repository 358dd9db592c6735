use camel::llm::{
    Backend, ChatEvent, ChatRequest, FinishReason, OllamaBackend, OpenAiCompatibleBackend,
    StreamCollector, StreamLimits, Turn,
};
use futures_util::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> ChatRequest {
    ChatRequest {
        model: "test-model".into(),
        system: Some("be brief".into()),
        turns: vec![Turn::user("hi")],
        tools: Vec::new(),
        temperature: 0.2,
    }
}

async fn collect(backend: &dyn Backend) -> Vec<ChatEvent> {
    backend
        .stream_chat(request(), CancellationToken::new())
        .collect()
        .await
}

fn ollama(server: &MockServer) -> OllamaBackend {
    OllamaBackend::new("local", &server.uri(), None, StreamLimits::default())
}

fn compatible(server: &MockServer, api_key: Option<&str>) -> OpenAiCompatibleBackend {
    OpenAiCompatibleBackend::new(
        "remote",
        &server.uri(),
        api_key.map(str::to_string),
        StreamLimits::default(),
    )
}

fn ndjson(lines: &[serde_json::Value]) -> ResponseTemplate {
    let body: String = lines.iter().map(|line| format!("{line}\n")).collect();
    ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson")
}

fn sse(chunks: &[&str]) -> ResponseTemplate {
    let body: String = chunks.iter().map(|data| format!("data: {data}\n\n")).collect();
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

// ── Ollama ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ollama_streams_text_until_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "test-model", "stream": true})))
        .respond_with(ndjson(&[
            json!({"message": {"role": "assistant", "content": "Hel"}, "done": false}),
            json!({"message": {"role": "assistant", "content": "lo"}, "done": false}),
            json!({"message": {"role": "assistant", "content": ""}, "done": true, "done_reason": "stop"}),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let events = collect(&ollama(&server)).await;

    assert_eq!(
        events,
        vec![
            ChatEvent::TextDelta("Hel".into()),
            ChatEvent::TextDelta("lo".into()),
            ChatEvent::Done(FinishReason::Stop),
        ]
    );
}

#[tokio::test]
async fn ollama_tool_calls_arrive_whole() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ndjson(&[json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "read", "arguments": {"path": "a.txt"}}},
                    {"function": {"name": "glob", "arguments": {"pattern": "*.rs"}}}
                ]
            },
            "done": true
        })]))
        .mount(&server)
        .await;

    let events = collect(&ollama(&server)).await;
    let mut collector = StreamCollector::new();
    for event in &events {
        collector.feed(event);
    }
    let response = collector.finish();

    assert_eq!(response.native_calls.len(), 2);
    assert_eq!(response.native_calls[0].name, "read");
    assert_eq!(response.native_calls[0].arguments["path"], json!("a.txt"));
    assert_eq!(response.native_calls[1].name, "glob");
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn ollama_error_status_becomes_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(r#"{"error":"model 'test-model' not found"}"#),
        )
        .mount(&server)
        .await;

    let events = collect(&ollama(&server)).await;

    assert_eq!(events.len(), 1);
    let ChatEvent::ConnectionError(detail) = &events[0] else {
        panic!("expected a connection error, got {events:?}");
    };
    assert!(detail.starts_with("HTTP 404"));
    assert!(detail.contains("not found"));
}

#[tokio::test]
async fn ollama_stream_without_done_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ndjson(&[
            json!({"message": {"role": "assistant", "content": "partial"}, "done": false}),
        ]))
        .mount(&server)
        .await;

    let events = collect(&ollama(&server)).await;

    assert_eq!(events[0], ChatEvent::TextDelta("partial".into()));
    assert_eq!(
        events.last(),
        Some(&ChatEvent::ConnectionError(
            "stream ended before completion".into()
        ))
    );
}

#[tokio::test]
async fn ollama_lists_models_from_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "gpt-oss:120b"}, {"name": "llama3.2"}]
        })))
        .mount(&server)
        .await;

    let backend = ollama(&server);
    backend.health_check().await.unwrap();
    assert_eq!(
        backend.list_models().await.unwrap(),
        vec!["gpt-oss:120b".to_string(), "llama3.2".to_string()]
    );
}

// ── OpenAI-compatible ───────────────────────────────────────────────────────

#[tokio::test]
async fn compatible_streams_sse_deltas() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "test-model", "stream": true})))
        .respond_with(sse(&[
            r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"content":" there"}}]}"#,
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let events = collect(&compatible(&server, Some("sk-test"))).await;

    assert_eq!(
        events,
        vec![
            ChatEvent::TextDelta("Hi".into()),
            ChatEvent::TextDelta(" there".into()),
            ChatEvent::Done(FinishReason::Stop),
        ]
    );
}

#[tokio::test]
async fn compatible_assembles_fragmented_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(&[
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"read","arguments":""}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"path\": "}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"b.txt\"}"}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
        ]))
        .mount(&server)
        .await;

    let events = collect(&compatible(&server, None)).await;
    let mut collector = StreamCollector::new();
    for event in &events {
        collector.feed(event);
    }
    let response = collector.finish();

    assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
    assert_eq!(response.native_calls.len(), 1);
    assert_eq!(response.native_calls[0].id, "call_a");
    assert_eq!(response.native_calls[0].arguments["path"], json!("b.txt"));
}

#[tokio::test]
async fn compatible_error_payload_ends_the_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(&[
            r#"{"choices":[{"index":0,"delta":{"content":"st"}}]}"#,
            r#"{"error":{"message":"context length exceeded"}}"#,
            r#"{"choices":[{"index":0,"delta":{"content":"never seen"}}]}"#,
        ]))
        .mount(&server)
        .await;

    let events = collect(&compatible(&server, None)).await;

    assert_eq!(
        events,
        vec![
            ChatEvent::TextDelta("st".into()),
            ChatEvent::ConnectionError("backend error: context length exceeded".into()),
        ]
    );
}

#[tokio::test]
async fn compatible_health_check_reports_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = compatible(&server, None).health_check().await.unwrap_err();
    assert!(err.to_string().contains("HTTP 503"));
}

#[tokio::test]
async fn unreachable_endpoint_yields_single_connection_error() {
    // Bind then drop a listener so the port is known to be closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = OllamaBackend::new(
        "local",
        &format!("http://{addr}"),
        None,
        StreamLimits::default(),
    );
    let events = collect(&backend).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        ChatEvent::ConnectionError(detail) if detail.starts_with("request failed")
    ));
}

#[tokio::test]
async fn cancelled_stream_ends_without_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ndjson(&[json!({"message": {"content": "late"}, "done": true})])
                .set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let mut stream = ollama(&server).stream_chat(request(), cancel.clone());
    cancel.cancel();

    assert_eq!(stream.next().await, None);
}

#[tokio::test]
async fn slow_response_hits_the_request_deadline_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ndjson(&[json!({"message": {"content": "late"}, "done": true})])
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let limits = StreamLimits {
        total: std::time::Duration::from_secs(1),
        idle: std::time::Duration::from_secs(1),
    };
    let backend = OllamaBackend::new("local", &server.uri(), None, limits);
    let started = std::time::Instant::now();
    let events = collect(&backend).await;

    assert_eq!(
        events,
        vec![ChatEvent::ConnectionError("request timed out after 1s".into())]
    );
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}
