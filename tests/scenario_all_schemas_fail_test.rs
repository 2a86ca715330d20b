// End-to-end scenario 6: every connection's schema extraction fails, so the
// request is rejected before any query generation is attempted.

mod common;

use std::sync::Arc;

use query_orchestration_engine::conversation::ConversationManager;
use query_orchestration_engine::llm::AiResponse;
use query_orchestration_engine::model::connection::SourceKind;
use query_orchestration_engine::model::response::AnalyzeRequest;
use query_orchestration_engine::orchestrator::ChatOrchestrator;
use query_orchestration_engine::registry::DataSourceRegistry;
use query_orchestration_engine::repository::{ConnectionRepository, ConversationRepository, InMemoryRepository};

#[tokio::test]
async fn all_schema_failures_abort_before_query_generation() {
    common::ensure_sql_drivers();

    let repo = Arc::new(InMemoryRepository::new());
    repo.insert_connection(common::connection(1, "alice", SourceKind::Mongodb, serde_json::json!({}))).await;
    repo.insert_connection(common::connection(2, "alice", SourceKind::Elasticsearch, serde_json::json!({}))).await;
    let connection_repository: Arc<dyn ConnectionRepository> = repo.clone();
    let conversation_repository: Arc<dyn ConversationRepository> = repo;

    let registry = Arc::new(DataSourceRegistry::new(connection_repository.clone()));
    registry
        .set_adapter(1, Arc::new(common::FakeAdapter::new_failing_schema(1, "mongo-down", SourceKind::Mongodb)))
        .await;
    registry
        .set_adapter(2, Arc::new(common::FakeAdapter::new_failing_schema(2, "es-down", SourceKind::Elasticsearch)))
        .await;

    let conversation = Arc::new(ConversationManager::new(conversation_repository));

    // The AI provider should never be consulted once every schema fails.
    let provider = Arc::new(common::ScriptedProvider::new(vec![AiResponse::direct_answer("should not be reached")]));

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
            user_message: "show me something".to_string(),
            conversation_id: None,
            connection_ids: vec![1, 2],
            ai_provider: Some("scripted".to_string()),
            is_clarification_response: false,
            clarification_answer: None,
        },
    )
    .await;

    assert_eq!(outcome.error.len(), 1);
    let error = outcome.error[0].error.as_ref().expect("error response carries error info");
    assert_eq!(error.code, "SCHEMA_ERROR");
    assert!(outcome.response.is_empty());
    assert!(!outcome.phases().contains(&"generating_queries".to_string()));
    assert!(provider.captured.lock().await.is_empty());
}
