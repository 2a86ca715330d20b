// src/transport/mod.rs
// Five typed per-user channels abstracting the wire format used by external
// collaborators (WebSocket, SSE, or anything else a caller wires up). FIFO
// per channel is guaranteed by `mpsc`; no ordering is implied across
// channels or across users.

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::model::AnalyzeResponse;

pub const PHASES: [&str; 11] = [
    "understanding_intent",
    "mapping_data_sources",
    "analyzing_schemas",
    "generating_queries",
    "ai_thinking",
    "executing_queries",
    "analyzing_data",
    "generating_dashboard",
    "preparing_response",
    "completed",
    "error",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    InProgress,
    Completed,
    Error,
    Ok,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMessage {
    pub phase: String,
    pub status: ActivityStatus,
    pub message: String,
    pub conversation_id: Option<i64>,
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationMessage {
    pub conversation_id: i64,
    pub question: String,
    pub suggested_options: Option<Vec<String>>,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Per-user handle to the five outbound channels. Cloning shares the
/// underlying senders, so every task working on behalf of one user can
/// emit on the same transport.
#[derive(Clone)]
pub struct UserTransport {
    activity_tx: mpsc::Sender<ActivityMessage>,
    clarification_tx: mpsc::Sender<ClarificationMessage>,
    response_tx: mpsc::Sender<AnalyzeResponse>,
    error_tx: mpsc::Sender<AnalyzeResponse>,
    pong_tx: mpsc::Sender<ActivityMessage>,
}

pub struct TransportReceivers {
    pub activity_rx: mpsc::Receiver<ActivityMessage>,
    pub clarification_rx: mpsc::Receiver<ClarificationMessage>,
    pub response_rx: mpsc::Receiver<AnalyzeResponse>,
    pub error_rx: mpsc::Receiver<AnalyzeResponse>,
    pub pong_rx: mpsc::Receiver<ActivityMessage>,
}

const CHANNEL_CAPACITY: usize = 64;

impl UserTransport {
    pub fn new() -> (Self, TransportReceivers) {
        let (activity_tx, activity_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (clarification_tx, clarification_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (response_tx, response_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (pong_tx, pong_rx) = mpsc::channel(CHANNEL_CAPACITY);

        (
            Self {
                activity_tx,
                clarification_tx,
                response_tx,
                error_tx,
                pong_tx,
            },
            TransportReceivers {
                activity_rx,
                clarification_rx,
                response_rx,
                error_rx,
                pong_rx,
            },
        )
    }

    /// Emits an activity event. Delivery is best-effort: a closed receiver
    /// (client disconnected) drops the message rather than erroring the
    /// orchestration; a disconnect must not roll back executed queries.
    pub async fn activity(&self, phase: &str, status: ActivityStatus, message: impl Into<String>, conversation_id: Option<i64>) {
        let _ = self
            .activity_tx
            .send(ActivityMessage {
                phase: phase.to_string(),
                status,
                message: message.into(),
                conversation_id,
                timestamp: Utc::now(),
            })
            .await;
    }

    pub async fn clarification(&self, conversation_id: i64, question: impl Into<String>, suggested_options: Option<Vec<String>>) {
        let _ = self
            .clarification_tx
            .send(ClarificationMessage {
                conversation_id,
                question: question.into(),
                suggested_options,
                timestamp: Utc::now(),
            })
            .await;
    }

    pub async fn response(&self, response: AnalyzeResponse) {
        let _ = self.response_tx.send(response).await;
    }

    pub async fn error(&self, response: AnalyzeResponse) {
        let _ = self.error_tx.send(response).await;
    }

    pub async fn pong(&self, message: impl Into<String>) {
        let _ = self
            .pong_tx
            .send(ActivityMessage {
                phase: "ping".to_string(),
                status: ActivityStatus::Ok,
                message: message.into(),
                conversation_id: None,
                timestamp: Utc::now(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn activity_messages_preserve_fifo_order() {
        let (transport, mut rx) = UserTransport::new();
        transport.activity("understanding_intent", ActivityStatus::InProgress, "start", Some(1)).await;
        transport.activity("understanding_intent", ActivityStatus::Completed, "done", Some(1)).await;

        let first = rx.activity_rx.recv().await.unwrap();
        let second = rx.activity_rx.recv().await.unwrap();
        assert_eq!(first.status, ActivityStatus::InProgress);
        assert_eq!(second.status, ActivityStatus::Completed);
    }

    #[tokio::test]
    async fn pong_is_activity_shaped_with_ping_phase() {
        let (transport, mut rx) = UserTransport::new();
        transport.pong("alive").await;
        let message = rx.pong_rx.recv().await.unwrap();
        assert_eq!(message.phase, "ping");
        assert_eq!(message.status, ActivityStatus::Ok);
    }
}
