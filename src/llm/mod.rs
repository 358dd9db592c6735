// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod http_client;
pub mod sse;
pub mod streaming;
pub mod tool_protocol;
pub mod traits;
pub mod transport;
pub mod types;

// ── Profiles and connectors ─────────────────────────────────────────────────
pub mod compatible;
pub mod factory;
pub mod ollama;
pub mod switch;

// ── Infrastructure re-exports ───────────────────────────────────────────────
pub use http_client::{build_backend_client, build_probe_client};
pub use sse::{SseBuffer, is_done_marker, parse_data_lines};
pub use streaming::{
    ChatEvent, ChatStream, CliStreamSink, CollectedResponse, FinishReason, NullStreamSink,
    StreamCollector, StreamSink, ToolCallFragment,
};
pub use tool_protocol::{
    CompositeParser, FencedToolParser, ParseOutcome, TaggedJsonParser, ToolCallParser,
    augment_system_prompt, render_tool_result,
};
pub use traits::{Backend, BackendFuture};
pub use transport::{FrameDecoder, StreamLimits, stream_response};
pub use types::{ChatRequest, Role, ToolCall, Turn};

// ── Connector + profile re-exports ──────────────────────────────────────────
pub use compatible::{OpenAiCompatibleBackend, SseDecoder};
pub use factory::{BackendFactory, create_backend, default_factory, resolve_api_key, stream_limits};
pub use ollama::{NdjsonDecoder, OllamaBackend};
pub use switch::BackendSwitchManager;
