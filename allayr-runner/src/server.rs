// Allayr Runner - HTTP endpoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! `/metrics`, `/health` and `/status` endpoints for a running loop.

use crate::metrics::encode_metrics;
use crate::replay::DatasetInfo;
use allayr::{ControlMode, LoopStats, TickOutcome};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Live view of the run, written by the control task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatus {
    pub running: bool,
    pub source: String,
    pub mode: String,
    pub stats: LoopStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<TickOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetInfo>,
}

impl RunStatus {
    pub fn new(source: impl Into<String>, mode: ControlMode) -> Self {
        Self {
            running: true,
            source: source.into(),
            mode: mode.to_string(),
            ..Default::default()
        }
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub status: Arc<RwLock<RunStatus>>,
    pub start_time: std::time::Instant,
}

/// Build the router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(port: u16, status: Arc<RwLock<RunStatus>>) -> std::io::Result<()> {
    let state = Arc::new(AppState {
        status,
        start_time: std::time::Instant::now(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    axum::serve(listener, router(state)).await
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>Allayr Runner</title></head>
<body>
    <h1>Allayr Runner</h1>
    <p>Compression control loop.</p>
    <ul>
        <li><a href="/metrics">/metrics</a> - Prometheus metrics</li>
        <li><a href="/health">/health</a> - Health check</li>
        <li><a href="/status">/status</a> - Loop status (JSON)</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    match encode_metrics() {
        Ok(metrics) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; charset=utf-8")],
            metrics,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("Content-Type", "text/plain; charset=utf-8")],
                e.to_string(),
            )
        }
    }
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    #[serde(flatten)]
    run: RunStatus,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let run = state.status.read().await.clone();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        run,
    })
}
