// src/config/mod.rs
// Central process-wide configuration for the orchestration engine.

pub mod ai;
pub mod conversation;
pub mod execution;
pub mod helpers;
pub mod registry;
pub mod server;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG: EngineConfig = EngineConfig::from_env();
}

/// Composes all domain configs, the way a process-wide config singleton
/// should: one `from_env()` per sub-domain, assembled once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub ai: ai::AiConfig,
    pub server: server::ServerConfig,
    pub logging: server::LoggingConfig,
    pub registry: registry::RegistryConfig,
    pub conversation: conversation::ConversationConfig,
    pub execution: execution::ExecutionConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            ai: ai::AiConfig::from_env(),
            server: server::ServerConfig::from_env(),
            logging: server::LoggingConfig::from_env(),
            registry: registry::RegistryConfig::from_env(),
            conversation: conversation::ConversationConfig::from_env(),
            execution: execution::ExecutionConfig::from_env(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.ai.validate()?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        self.server.bind_address()
    }

    pub fn default_provider(&self) -> Option<String> {
        self.ai.default_provider()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
