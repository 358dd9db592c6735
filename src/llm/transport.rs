use super::streaming::{ChatEvent, ChatStream};
use crate::utils::truncate_with_ellipsis;
use futures_util::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ERROR_BODY_CHARS: usize = 300;

/// Deadlines applied to one streamed completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLimits {
    /// Overall deadline, measured from when the request is sent.
    pub total: Duration,
    /// Longest allowed gap between two body chunks.
    pub idle: Duration,
}

impl Default for StreamLimits {
    fn default() -> Self {
        Self {
            total: Duration::from_secs(300),
            idle: Duration::from_secs(90),
        }
    }
}

/// Turns raw body bytes of one wire dialect into chat events.
pub trait FrameDecoder: Send + 'static {
    fn push(&mut self, chunk: &[u8]) -> Vec<ChatEvent>;

    /// Called once the body has ended; flushes any buffered frame.
    fn finish(&mut self) -> Vec<ChatEvent>;
}

enum Step {
    Cancelled,
    Events(Vec<ChatEvent>),
    Failed(String),
    Ended,
}

fn is_terminal(event: &ChatEvent) -> bool {
    matches!(event, ChatEvent::Done(_) | ChatEvent::ConnectionError(_))
}

/// Drive an HTTP request and decode its body into a [`ChatStream`].
///
/// Every failure mode ends the stream with exactly one `ConnectionError`.
/// Cancellation is checked between chunks and ends the stream without any
/// further event; dropping the body stops reading the connection.
pub fn stream_response<F, D>(
    profile: String,
    send: F,
    mut decoder: D,
    limits: StreamLimits,
    cancel: CancellationToken,
) -> ChatStream
where
    F: Future<Output = reqwest::Result<reqwest::Response>> + Send + 'static,
    D: FrameDecoder,
{
    let stream = async_stream::stream! {
        let deadline = tokio::time::Instant::now() + limits.total;

        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            () = tokio::time::sleep_until(deadline) => Some(Err(format!(
                "request timed out after {}s",
                limits.total.as_secs()
            ))),
            result = send => Some(result.map_err(|error| format!("request failed: {error}"))),
        };

        let response = match sent {
            None => {
                tracing::debug!(backend = profile, "stream cancelled before response");
                return;
            }
            Some(Err(detail)) => {
                tracing::warn!(backend = profile, "{detail}");
                yield ChatEvent::ConnectionError(detail);
                return;
            }
            Some(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::time::timeout(limits.idle, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            let detail = format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_with_ellipsis(body.trim(), ERROR_BODY_CHARS)
            );
            tracing::warn!(backend = profile, status = status.as_u16(), "backend rejected request");
            yield ChatEvent::ConnectionError(detail);
            return;
        }

        let mut body = response.bytes_stream();
        loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => Step::Cancelled,
                () = tokio::time::sleep_until(deadline) => Step::Failed(format!(
                    "stream exceeded deadline of {}s",
                    limits.total.as_secs()
                )),
                () = tokio::time::sleep(limits.idle) => Step::Failed(format!(
                    "no data received for {}s",
                    limits.idle.as_secs()
                )),
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => Step::Events(decoder.push(&bytes)),
                    Some(Err(error)) => Step::Failed(format!("stream interrupted: {error}")),
                    None => Step::Ended,
                },
            };

            let events = match step {
                Step::Cancelled => {
                    tracing::debug!(backend = profile, "stream cancelled");
                    return;
                }
                Step::Failed(detail) => {
                    tracing::warn!(backend = profile, "{detail}");
                    yield ChatEvent::ConnectionError(detail);
                    return;
                }
                Step::Events(events) => events,
                Step::Ended => {
                    let mut tail = decoder.finish();
                    if !tail.iter().any(is_terminal) {
                        tail.push(ChatEvent::ConnectionError(
                            "stream ended before completion".to_string(),
                        ));
                    }
                    tail
                }
            };

            for event in events {
                let terminal = is_terminal(&event);
                yield event;
                if terminal {
                    return;
                }
            }
        }
    };

    Box::pin(stream)
}
