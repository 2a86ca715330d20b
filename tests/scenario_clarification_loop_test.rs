// End-to-end scenario 1: a vague request gets a clarification question, and
// a follow-up on the same conversation proceeds normally.

mod common;

use std::sync::Arc;

use query_orchestration_engine::conversation::ConversationManager;
use query_orchestration_engine::llm::AiResponse;
use query_orchestration_engine::model::response::AnalyzeRequest;
use query_orchestration_engine::orchestrator::ChatOrchestrator;
use query_orchestration_engine::registry::DataSourceRegistry;
use query_orchestration_engine::repository::{ConnectionRepository, ConversationRepository, InMemoryRepository};

#[tokio::test]
async fn clarification_then_direct_answer_on_followup() {
    common::ensure_sql_drivers();

    let repo = Arc::new(InMemoryRepository::new());
    repo.insert_connection(common::sqlite_connection(1, "alice", ":memory:")).await;
    let connection_repository: Arc<dyn ConnectionRepository> = repo.clone();
    let conversation_repository: Arc<dyn ConversationRepository> = repo;

    let registry = Arc::new(DataSourceRegistry::new(connection_repository.clone()));
    let conversation = Arc::new(ConversationManager::new(conversation_repository));

    let provider = Arc::new(common::ScriptedProvider::new(vec![
        AiResponse {
            response_type: query_orchestration_engine::llm::AiResponseType::ClarificationNeeded,
            content: "Need time range".to_string(),
            intent: None,
            clarification_question: Some("Which period?".to_string()),
            suggested_options: Some(vec!["Today".to_string(), "Last 7 days".to_string(), "Last month".to_string()]),
            data_requests: None,
        },
        AiResponse::direct_answer("Here are sales for the last 7 days."),
    ]));

    let orchestrator = ChatOrchestrator::new(
        registry,
        connection_repository,
        conversation,
        common::providers_with("scripted", provider),
    );

    let first = common::run_request(
        &orchestrator,
        "alice",
        AnalyzeRequest {
            user_message: "Show sales".to_string(),
            conversation_id: None,
            connection_ids: vec![1],
            ai_provider: Some("scripted".to_string()),
            is_clarification_response: false,
            clarification_answer: None,
        },
    )
    .await;

    assert_eq!(first.clarification.len(), 1);
    let clarification = &first.clarification[0];
    assert_eq!(clarification.question, "Which period?");
    assert_eq!(
        clarification.suggested_options,
        Some(vec!["Today".to_string(), "Last 7 days".to_string(), "Last month".to_string()])
    );
    assert!(first.response.is_empty());
    assert!(!first.phases().contains(&"executing_queries".to_string()));

    let conversation_id = clarification.conversation_id;

    let second = common::run_request(
        &orchestrator,
        "alice",
        AnalyzeRequest {
            user_message: "Last 7 days".to_string(),
            conversation_id: Some(conversation_id),
            connection_ids: vec![1],
            ai_provider: Some("scripted".to_string()),
            is_clarification_response: true,
            clarification_answer: Some("Last 7 days".to_string()),
        },
    )
    .await;

    assert_eq!(second.response.len(), 1);
    assert!(second.response[0].success);
    assert_eq!(second.response[0].conversation_id, conversation_id);
}
