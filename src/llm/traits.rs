use super::streaming::ChatStream;
use super::types::ChatRequest;
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// A connector bound to one backend profile.
pub trait Backend: Send + Sync {
    /// Name of the profile this connector was built for.
    fn profile_name(&self) -> &str;

    /// Issue one streamed completion.
    ///
    /// The returned stream is lazy, finite and single-use. Failures arrive as
    /// a final `ConnectionError` event; when `cancel` fires the stream stops
    /// reading the connection and ends without further events.
    fn stream_chat(&self, request: ChatRequest, cancel: CancellationToken) -> ChatStream;

    /// Cheap reachability probe.
    fn health_check(&self) -> BackendFuture<'_, ()>;

    /// Model ids advertised by the endpoint.
    fn list_models(&self) -> BackendFuture<'_, Vec<String>>;
}
