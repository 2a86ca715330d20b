// src/state.rs
// Application state shared across HTTP/WebSocket handlers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::CONFIG;
use crate::conversation::ConversationManager;
use crate::llm::claude::ClaudeProvider;
use crate::llm::eren::ErenProvider;
use crate::llm::gemini::GeminiProvider;
use crate::llm::openai::OpenAiProvider;
use crate::llm::AiProvider;
use crate::orchestrator::ChatOrchestrator;
use crate::registry::DataSourceRegistry;
use crate::repository::{ConnectionRepository, ConversationRepository, InMemoryRepository};

/// Application state shared across handlers. A transport is created per
/// inbound connection by the API layer, not stored here — the five
/// channels it carries are per-user-per-connection, not process-wide.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DataSourceRegistry>,
    pub conversation: Arc<ConversationManager>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl AppState {
    pub async fn new() -> Result<Self> {
        info!("loading configuration");
        CONFIG.validate()?;
        sqlx::any::install_default_drivers();

        info!("initializing in-memory repository");
        let repository = InMemoryRepository::shared();
        let connection_repository: Arc<dyn ConnectionRepository> = repository.clone();
        let conversation_repository: Arc<dyn ConversationRepository> = repository;

        info!("initializing data source registry");
        let registry = Arc::new(DataSourceRegistry::new(connection_repository.clone()));

        info!("initializing conversation state manager");
        let conversation = Arc::new(ConversationManager::new(conversation_repository));

        info!("initializing AI providers");
        let mut providers: HashMap<&'static str, Arc<dyn AiProvider>> = HashMap::new();
        providers.insert("gemini", Arc::new(GeminiProvider::new(CONFIG.ai.gemini.clone())));
        providers.insert("claude", Arc::new(ClaudeProvider::new(CONFIG.ai.claude.clone())));
        providers.insert("openai", Arc::new(OpenAiProvider::new(CONFIG.ai.openai.clone())));
        providers.insert("eren", Arc::new(ErenProvider::new(CONFIG.ai.eren.clone())));

        info!("initializing chat orchestrator");
        let orchestrator = Arc::new(ChatOrchestrator::new(registry.clone(), connection_repository, conversation.clone(), providers));

        Ok(Self {
            registry,
            conversation,
            orchestrator,
        })
    }
}

/// Periodically evicts stale conversation states. Intended to be spawned
/// once at startup via `tokio::spawn`.
pub async fn run_conversation_sweep(conversation: Arc<ConversationManager>) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(CONFIG.conversation.sweep_interval_secs));
    loop {
        ticker.tick().await;
        conversation.cleanup().await;
    }
}
