use reqwest::Client;
use std::time::Duration;

/// Pooled client for backend traffic.
///
/// No overall request timeout is set here: streamed completions are bounded
/// by the stream driver's own deadline and idle limit instead.
pub fn build_backend_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Short-lived client for health checks and model listings.
pub fn build_probe_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}
