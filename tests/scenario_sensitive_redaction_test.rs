// End-to-end scenario 5: columns recognized as sensitive are redacted from
// both the sample rows and the column statistics sent to the AI.

mod common;

use std::sync::Arc;

use query_orchestration_engine::conversation::ConversationManager;
use query_orchestration_engine::llm::AiResponse;
use query_orchestration_engine::model::request::{DataRequest, DataRequestKind};
use query_orchestration_engine::model::response::AnalyzeRequest;
use query_orchestration_engine::orchestrator::ChatOrchestrator;
use query_orchestration_engine::registry::DataSourceRegistry;
use query_orchestration_engine::repository::{ConnectionRepository, ConversationRepository, InMemoryRepository};

async fn seed_customers_table(path: &str) {
    let pool = sqlx::SqlitePool::connect(&format!("sqlite://{path}?mode=rwc")).await.unwrap();
    sqlx::query(
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, email TEXT NOT NULL, password_hash TEXT NOT NULL, amount REAL NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO customers (id, email, password_hash, amount) VALUES (1, 'a@b.com', 'hash1', 10.0), (2, 'c@d.com', 'hash2', 20.0)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;
}

#[tokio::test]
async fn sensitive_columns_are_redacted_in_ai_prompt_and_samples() {
    common::ensure_sql_drivers();

    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();
    seed_customers_table(&path).await;

    let repo = Arc::new(InMemoryRepository::new());
    repo.insert_connection(common::sqlite_connection(1, "alice", &path)).await;
    let connection_repository: Arc<dyn ConnectionRepository> = repo.clone();
    let conversation_repository: Arc<dyn ConversationRepository> = repo;

    let registry = Arc::new(DataSourceRegistry::new(connection_repository.clone()));
    let conversation = Arc::new(ConversationManager::new(conversation_repository));

    let provider = Arc::new(common::ScriptedProvider::new(vec![
        AiResponse {
            response_type: query_orchestration_engine::llm::AiResponseType::ReadyToExecute,
            content: "running your query".to_string(),
            intent: None,
            clarification_question: None,
            suggested_options: None,
            data_requests: Some(vec![DataRequest {
                kind: DataRequestKind::SqlQuery {
                    sql: "SELECT id, email, password_hash, amount FROM customers".to_string(),
                },
                source_id: None,
                step: None,
                depends_on: None,
                output_as: None,
                output_field: None,
                description: Some("list customers".to_string()),
                explanation: Some("list customers".to_string()),
            }]),
        },
        AiResponse::direct_answer("customers summary"),
        AiResponse::direct_answer("table of customers"),
    ]));

    let orchestrator = ChatOrchestrator::new(
        registry,
        connection_repository,
        conversation,
        common::providers_with("scripted", provider.clone()),
    );

    let outcome = common::run_request(
        &orchestrator,
        "alice",
        AnalyzeRequest {
            user_message: "list customers".to_string(),
            conversation_id: None,
            connection_ids: vec![1],
            ai_provider: Some("scripted".to_string()),
            is_clarification_response: false,
            clarification_answer: None,
        },
    )
    .await;

    assert_eq!(outcome.response.len(), 1);
    assert!(outcome.response[0].success);

    let captured = provider.captured.lock().await;
    assert_eq!(captured.len(), 3, "expected decision, analysis, dashboard calls");
    let analysis_prompt = captured[1].raw_prompt.clone().expect("analysis request carries a rendered prompt");

    assert!(analysis_prompt.contains("email [REDACTED]"));
    assert!(analysis_prompt.contains("password_hash [REDACTED]"));
    assert!(analysis_prompt.contains("amount type=numeric"));
    assert!(analysis_prompt.contains("id type=numeric"));
    assert!(!analysis_prompt.contains("a@b.com"));
    assert!(!analysis_prompt.contains("hash1"));

    let result = &outcome.response[0].query_results[0];
    for row in &result.execution.rows {
        assert_eq!(row.get("id").is_some(), true);
    }
}
