// src/bin/orchestrator_cli.rs
// Thin smoke-test harness: issues one AnalyzeRequest against an in-process
// AppState and prints the streamed activity/response JSON to stdout. Not a
// product surface.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde_json::json;

use query_orchestration_engine::model::response::AnalyzeRequest;
use query_orchestration_engine::transport::UserTransport;
use query_orchestration_engine::AppState;

#[derive(Parser)]
struct Cli {
    /// The question to ask.
    #[arg(long)]
    message: String,

    /// Connection ids to scope the question to.
    #[arg(long, value_delimiter = ',')]
    connections: Vec<i64>,

    /// Owner id the connections must belong to.
    #[arg(long, default_value = "cli-user")]
    owner: String,

    /// Explicit AI provider name; falls back to the configured default.
    #[arg(long)]
    provider: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    let state = Arc::new(AppState::new().await?);

    let request = AnalyzeRequest {
        user_message: cli.message,
        conversation_id: None,
        connection_ids: cli.connections,
        ai_provider: cli.provider,
        is_clarification_response: false,
        clarification_answer: None,
    };

    let (transport, mut receivers) = UserTransport::new();

    let drain = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = receivers.activity_rx.recv() => println!("{}", json!({"activity": msg})),
                Some(msg) = receivers.clarification_rx.recv() => println!("{}", json!({"clarification": msg})),
                Some(msg) = receivers.response_rx.recv() => { println!("{}", json!({"response": msg})); break; }
                Some(msg) = receivers.error_rx.recv() => { println!("{}", json!({"error": msg})); break; }
                else => break,
            }
        }
    });

    state.orchestrator.handle(&cli.owner, &transport, request).await;
    drop(transport);
    let _ = drain.await;

    Ok(())
}
