//! Status and metrics HTTP surface for the scheduler process itself
//! (distinct from `rain-api`'s read-only grid surface): the latest
//! [`StatusEvent`], a running tally of iterations, and a Prometheus
//! metrics render, grounded on the downloader/ingester services'
//! status-server pattern in this stack.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::RwLock;

use cml_common::StatusEvent;

/// Latest status snapshot, updated by the scheduler loop after every
/// tick and read by the `/status` handler.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<Option<StatusEvent>>>,
    iterations: Arc<std::sync::atomic::AtomicU64>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, event: StatusEvent) {
        *self.inner.write().await = Some(event);
        self.iterations.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    async fn snapshot(&self) -> Option<StatusEvent> {
        self.inner.read().await.clone()
    }
}

#[derive(Serialize)]
struct StatusResponse {
    service: &'static str,
    iterations: u64,
    last_event: Option<StatusEvent>,
}

async fn status_handler(Extension(board): Extension<StatusBoard>) -> impl IntoResponse {
    let last_event = board.snapshot().await;
    let iterations = board.iterations.load(std::sync::atomic::Ordering::Relaxed);
    Json(StatusResponse { service: "rain-scheduler", iterations, last_event })
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

/// Builds the router; `board` is cloned into every request's extensions.
pub fn router(board: StatusBoard, prometheus: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(board))
        .layer(Extension(prometheus))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_reads_back_latest_event() {
        let board = StatusBoard::new();
        board.record(StatusEvent::new(1, "Progress", "starting", 5)).await;
        let snap = board.snapshot().await.unwrap();
        assert_eq!(snap.progress, 5);
        assert_eq!(board.iterations.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
