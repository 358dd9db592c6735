//! JSON status API served by `camel dashboard`.

use super::guardian::{RestartRequests, read_state_file};
use crate::config::Config;
use crate::status::{StatusFeed, StatusFileWatcher, StatusReader, StatusSnapshot};
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

pub const MAX_BODY_SIZE: usize = 16_384;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_LINES: usize = 100;
pub const MAX_LOG_LINES: usize = 2_000;
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Only the end of a log file is read when tailing.
const TAIL_WINDOW_BYTES: u64 = 512 * 1024;

#[derive(Clone)]
pub struct DashboardState {
    pub status: StatusReader,
    pub guardian_state_file: Arc<PathBuf>,
    /// Log file of each guarded process that has one, by process name.
    pub log_files: Arc<HashMap<String, PathBuf>>,
    /// Names of every guarded process.
    pub processes: Arc<Vec<String>>,
    pub restarts: RestartRequests,
    /// Process used when a request names none.
    pub default_process: Arc<str>,
}

impl DashboardState {
    pub fn from_config(config: &Config, status: StatusReader) -> Self {
        let log_files = config
            .guardian
            .processes
            .iter()
            .filter_map(|process| {
                let log_file = process.log_file.as_deref()?;
                Some((process.name.clone(), config.resolve_path(log_file)))
            })
            .collect();
        Self {
            status,
            guardian_state_file: Arc::new(config.resolve_path(&config.guardian.state_file)),
            log_files: Arc::new(log_files),
            processes: Arc::new(
                config
                    .guardian
                    .processes
                    .iter()
                    .map(|process| process.name.clone())
                    .collect(),
            ),
            restarts: RestartRequests::new(config.resolve_path(&config.guardian.restart_dir)),
            default_process: Arc::from(config.dashboard.log_process.as_str()),
        }
    }

    fn target<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&*self.default_process)
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub lines: Option<usize>,
    pub process: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RestartQuery {
    pub process: Option<String>,
}

pub fn build_app(state: DashboardState) -> Router {
    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/status", get(handle_status))
        .route("/api/guardian", get(handle_guardian))
        .route("/api/logs", get(handle_logs))
        .route("/api/restart", post(handle_restart))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST]),
        )
}

/// GET /api/health: liveness target for the guardian's HTTP probe
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/status: latest published snapshot
async fn handle_status(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.status.latest().as_ref().clone())
}

/// GET /api/guardian: guardian state file contents
async fn handle_guardian(State(state): State<DashboardState>) -> impl IntoResponse {
    match read_state_file(&state.guardian_state_file).await {
        Ok(status) => (StatusCode::OK, Json(serde_json::to_value(status).unwrap_or_default())),
        Err(error) => {
            tracing::debug!("guardian state unavailable: {error:#}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"error": "guardian state unavailable"})),
            )
        }
    }
}

fn error_body(status: StatusCode, message: String) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({"error": message})))
}

/// GET /api/logs?lines=N&process=NAME: last lines of a guarded process log
async fn handle_logs(
    State(state): State<DashboardState>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    let process = state.target(query.process.as_deref());
    let Some(path) = state.log_files.get(process) else {
        return error_body(StatusCode::NOT_FOUND, format!("no log file for process '{process}'"));
    };
    let lines = query.lines.unwrap_or(DEFAULT_LOG_LINES).clamp(1, MAX_LOG_LINES);
    match tail_lines(path, lines).await {
        Ok(tail) => (
            StatusCode::OK,
            Json(serde_json::json!({"process": process, "lines": tail})),
        ),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => error_body(
            StatusCode::NOT_FOUND,
            format!("process '{process}' has not written a log yet"),
        ),
        Err(error) => {
            tracing::warn!(process, path = %path.display(), "cannot read log: {error}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "log unavailable".to_string())
        }
    }
}

/// POST /api/restart?process=NAME: ask the guardian to restart a process
async fn handle_restart(
    State(state): State<DashboardState>,
    Query(query): Query<RestartQuery>,
) -> impl IntoResponse {
    let process = state.target(query.process.as_deref());
    if !state.processes.iter().any(|name| name == process) {
        return error_body(StatusCode::NOT_FOUND, format!("unknown process '{process}'"));
    }
    match state.restarts.request(process).await {
        Ok(()) => {
            tracing::info!(process, "restart requested through the dashboard");
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({"process": process, "restart": "requested"})),
            )
        }
        Err(error) => {
            tracing::warn!(process, "cannot record restart request: {error:#}");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "restart request failed".to_string())
        }
    }
}

/// Last `lines` lines of `path`, reading at most [`TAIL_WINDOW_BYTES`].
pub async fn tail_lines(path: &Path, lines: usize) -> std::io::Result<Vec<String>> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let start = len.saturating_sub(TAIL_WINDOW_BYTES);
    file.seek(SeekFrom::Start(start)).await?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).await?;

    let text = String::from_utf8_lossy(&bytes);
    let mut all: Vec<&str> = text.lines().collect();
    if start > 0 && !all.is_empty() {
        // the window starts mid-line
        all.remove(0);
    }
    let skip = all.len().saturating_sub(lines);
    Ok(all[skip..].iter().map(|line| (*line).to_string()).collect())
}

/// Serve on an already-bound listener until `cancel` fires.
pub async fn serve_with_listener(
    listener: tokio::net::TcpListener,
    config: &Config,
    cancel: CancellationToken,
) -> Result<()> {
    let (publisher, reader) = StatusFeed::new(StatusSnapshot::default());
    let watcher = StatusFileWatcher::new(config.status_path(), STATUS_POLL_INTERVAL);
    watcher.poll_once(&publisher).await;
    let poller = watcher.spawn(publisher, cancel.child_token());

    let app = build_app(DashboardState::from_config(config, reader));
    let shutdown = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("serve dashboard API");
    cancel.cancel();
    let _ = poller.await;
    served
}

/// `camel dashboard`: bind and serve until Ctrl-C.
pub async fn run(config: &Config, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("parse dashboard bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind dashboard socket {addr}"))?;
    let local = listener.local_addr().context("dashboard local address")?;

    println!("Dashboard API listening on http://{local}");
    println!("  GET  /api/health");
    println!("  GET  /api/status");
    println!("  GET  /api/guardian");
    println!("  GET  /api/logs?lines=N&process=NAME");
    println!("  POST /api/restart?process=NAME");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    serve_with_listener(listener, config, cancel).await
}
