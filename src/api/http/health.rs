// src/api/http/health.rs
// Health, readiness, and liveness probes for load balancers and k8s.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::config::CONFIG;
use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    providers_configured: usize,
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let _ = &state;
    let configured = CONFIG.ai.known_providers().iter().filter(|(_, cfg)| cfg.is_configured()).count();
    let healthy = configured > 0;

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        providers_configured: configured,
    };

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// GET /ready — there is no in-crate schema to migrate; readiness depends
/// only on startup configuration validation having already passed.
pub async fn readiness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ready"})))
}

/// GET /live
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "alive"})))
}
