// src/config/server.rs
// Server and logging configuration.

use serde::{Deserialize, Serialize};

use super::helpers::{env_or, env_usize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_usize("PORT", 8080) as u16,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: env_or("RUST_LOG", "info"),
            json: env_or("LOG_JSON", "false").parse().unwrap_or(false),
        }
    }
}
