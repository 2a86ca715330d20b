// src/metrics/mod.rs
// Prometheus metrics for the query orchestration engine.

use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static ACTIVE_CONNECTIONS: AtomicU64 = AtomicU64::new(0);

pub fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder");

    PROMETHEUS_HANDLE
        .set(handle)
        .expect("prometheus handle already initialized");

    info!("prometheus metrics initialized");
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized".to_string()),
    }
}

pub fn record_request(phase: &str) {
    counter!("engine_requests_total", "phase" => phase.to_string()).increment(1);
}

pub fn record_request_duration(phase: &str, duration_seconds: f64) {
    histogram!("engine_request_duration_seconds", "phase" => phase.to_string()).record(duration_seconds);
}

pub fn record_llm_call(provider: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("engine_llm_calls_total", "provider" => provider.to_string(), "status" => status).increment(1);
}

pub fn record_query_execution(kind: &str, success: bool, duration_seconds: f64) {
    let status = if success { "success" } else { "error" };
    counter!("engine_query_executions_total", "kind" => kind.to_string(), "status" => status).increment(1);
    histogram!("engine_query_duration_seconds", "kind" => kind.to_string()).record(duration_seconds);
}

pub fn connection_opened() {
    let count = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    gauge!("engine_active_connections").set(count as f64);
}

pub fn connection_closed() {
    let count = ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
    gauge!("engine_active_connections").set(count as f64);
}

/// Times a phase of the orchestrator flow; records on drop regardless of
/// whether the phase succeeded.
pub struct RequestTimer {
    start: Instant,
    phase: String,
}

impl RequestTimer {
    pub fn new(phase: &str) -> Self {
        record_request(phase);
        Self {
            start: Instant::now(),
            phase: phase.to_string(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        record_request_duration(&self.phase, self.start.elapsed().as_secs_f64());
    }
}
