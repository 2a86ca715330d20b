// src/api/ws/mod.rs
// WebSocket transport: one socket per user, carrying inbound AnalyzeRequest
// JSON messages and fanning the five C10 channels out as tagged outbound
// frames. Grounded on `api/ws/chat/mod.rs`'s `ws_chat_handler`/`handle_socket`
// split (upgrade, then a dedicated receive loop per connection).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::{
    extract::{ConnectInfo, Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::metrics;
use crate::model::response::AnalyzeRequest;
use crate::state::AppState;
use crate::transport::UserTransport;

#[derive(Deserialize)]
pub struct WsQuery {
    /// The identity this connection authenticates as. Real authentication
    /// (JWT verification, session lookup) is an external collaborator per
    /// the purpose-and-scope boundary; this query param is the seam a
    /// caller wires an auth layer into.
    user_id: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr, query.user_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, addr: SocketAddr, user_id: String) {
    info!(%addr, %user_id, "websocket connected");
    metrics::connection_opened();

    let (mut sink, mut stream) = socket.split();
    let (transport, mut receivers) = UserTransport::new();

    let outbound = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = receivers.activity_rx.recv() => {
                    if forward(&mut sink, "activity", &msg).await.is_err() { break; }
                }
                Some(msg) = receivers.clarification_rx.recv() => {
                    if forward(&mut sink, "clarification", &msg).await.is_err() { break; }
                }
                Some(msg) = receivers.response_rx.recv() => {
                    if forward(&mut sink, "response", &msg).await.is_err() { break; }
                }
                Some(msg) = receivers.error_rx.recv() => {
                    if forward(&mut sink, "error", &msg).await.is_err() { break; }
                }
                Some(msg) = receivers.pong_rx.recv() => {
                    if forward(&mut sink, "pong", &msg).await.is_err() { break; }
                }
                else => break,
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<AnalyzeRequest>(&text) {
                Ok(request) => {
                    let orchestrator = state.orchestrator.clone();
                    let transport = transport.clone();
                    let owner_id = user_id.clone();
                    tokio::spawn(async move {
                        orchestrator.handle(&owner_id, &transport, request).await;
                    });
                }
                Err(e) => warn!(error = %e, "failed to parse inbound message"),
            },
            Ok(Message::Ping(_)) => transport.pong("pong").await,
            Ok(Message::Close(_)) => {
                info!(%addr, "client initiated close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "websocket error");
                break;
            }
        }
    }

    outbound.abort();
    metrics::connection_closed();
    info!(%addr, %user_id, "websocket disconnected");
}

async fn forward<T>(sink: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin), kind: &str, payload: &T) -> Result<(), axum::Error>
where
    T: serde::Serialize,
{
    let body = serde_json::json!({ "type": kind, "payload": payload });
    sink.send(Message::Text(Utf8Bytes::from(body.to_string()))).await
}
