// src/main.rs
// Query orchestration engine HTTP/WebSocket server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use query_orchestration_engine::api::build_router;
use query_orchestration_engine::config::CONFIG;
use query_orchestration_engine::metrics;
use query_orchestration_engine::registry::run_registry_sweep;
use query_orchestration_engine::state::{run_conversation_sweep, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_new(&CONFIG.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if CONFIG.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("starting query orchestration engine");
    metrics::init_metrics();

    let state = Arc::new(AppState::new().await?);
    tokio::spawn(run_conversation_sweep(state.conversation.clone()));
    tokio::spawn(run_registry_sweep(state.registry.clone()));

    let addr: SocketAddr = CONFIG.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    let router = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, router).await?;

    Ok(())
}
