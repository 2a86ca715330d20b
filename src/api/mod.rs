// src/api/mod.rs
// HTTP and WebSocket surface binding AppState to axum.

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(http::router())
        .merge(ws::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
