// End-to-end scenario 3: a SQL step feeds its output into a dependent Mongo
// step's filter via $variable substitution.

mod common;

use std::sync::Arc;

use query_orchestration_engine::conversation::ConversationManager;
use query_orchestration_engine::llm::AiResponse;
use query_orchestration_engine::model::connection::SourceKind;
use query_orchestration_engine::model::request::DataRequestKind;
use query_orchestration_engine::model::response::AnalyzeRequest;
use query_orchestration_engine::model::result::ExecutionResult;
use query_orchestration_engine::orchestrator::ChatOrchestrator;
use query_orchestration_engine::registry::DataSourceRegistry;
use query_orchestration_engine::repository::{ConnectionRepository, ConversationRepository, InMemoryRepository};

use common::ScriptedItem;

async fn seed_users_table(path: &str) {
    let pool = sqlx::SqlitePool::connect(&format!("sqlite://{path}?mode=rwc")).await.unwrap();
    sqlx::query("CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO users (id, username) VALUES (5, 'johndoe')")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;
}

#[tokio::test]
async fn sql_step_output_feeds_mongo_filter() {
    common::ensure_sql_drivers();

    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();
    seed_users_table(&path).await;

    let repo = Arc::new(InMemoryRepository::new());
    repo.insert_connection(common::sqlite_connection(1, "alice", &path)).await;
    repo.insert_connection(common::connection(2, "alice", SourceKind::Mongodb, serde_json::json!({}))).await;
    let connection_repository: Arc<dyn ConnectionRepository> = repo.clone();
    let conversation_repository: Arc<dyn ConversationRepository> = repo;

    let registry = Arc::new(DataSourceRegistry::new(connection_repository.clone()));
    let mongo_rows = vec![{
        let mut row = serde_json::Map::new();
        row.insert("user_id".to_string(), serde_json::json!(5));
        row.insert("action".to_string(), serde_json::json!("login"));
        row
    }];
    let mongo_adapter = Arc::new(common::FakeAdapter::new(
        2,
        "activities-source",
        SourceKind::Mongodb,
        ExecutionResult::ok(mongo_rows, vec!["user_id".to_string(), "action".to_string()], 5),
    ));
    registry.set_adapter(2, mongo_adapter.clone()).await;

    let conversation = Arc::new(ConversationManager::new(conversation_repository));

    // Raw camelCase completion text, exactly the shape the decision prompt
    // asks a real model to produce, routed through the same parsing path a
    // live provider's response would go through.
    let decision_json = r#"{
        "responseType": "READY_TO_EXECUTE",
        "message": "chaining across sources",
        "dataRequests": [
            {
                "kind": "SQL_QUERY",
                "sql": "SELECT id FROM users WHERE username = 'johndoe'",
                "sourceId": "1",
                "step": 1,
                "outputAs": "$user_id",
                "outputField": "id",
                "explanation": "find johndoe's id"
            },
            {
                "kind": "MONGO_QUERY",
                "collection": "activities",
                "operation": "find",
                "filter": {"user_id": "$user_id"},
                "sourceId": "2",
                "step": 2,
                "dependsOn": 1,
                "explanation": "find johndoe's activities"
            }
        ]
    }"#;

    let provider = Arc::new(common::ScriptedProvider::new_items(vec![
        ScriptedItem::RawText(decision_json.to_string()),
        ScriptedItem::Response(AiResponse::direct_answer("johndoe logged in recently.")),
        ScriptedItem::Response(AiResponse::direct_answer("table of activities")),
    ]));

    let orchestrator = ChatOrchestrator::new(
        registry,
        connection_repository,
        conversation,
        common::providers_with("scripted", provider),
    );

    let outcome = common::run_request(
        &orchestrator,
        "alice",
        AnalyzeRequest {
            user_message: "what has johndoe been doing?".to_string(),
            conversation_id: None,
            connection_ids: vec![1, 2],
            ai_provider: Some("scripted".to_string()),
            is_clarification_response: false,
            clarification_answer: None,
        },
    )
    .await;

    assert_eq!(outcome.response.len(), 1);
    assert!(outcome.response[0].success);
    assert_eq!(outcome.response[0].query_results.len(), 2);
    assert_eq!(outcome.response[0].query_results[0].execution.rows.len(), 1);
    assert!(outcome.response[0].query_results[1].execution.success);

    let captured = mongo_adapter.captured.lock().await;
    assert_eq!(captured.len(), 1);
    let DataRequestKind::MongoQuery { filter, .. } = &captured[0].kind else {
        panic!("expected a Mongo query request");
    };
    assert_eq!(filter, &serde_json::json!({"user_id": 5}));
}
