// src/config/registry.rs

use serde::{Deserialize, Serialize};

use super::helpers::env_usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub eviction_sweep_secs: u64,
    pub probe_timeout_secs: u64,
}

impl RegistryConfig {
    pub fn from_env() -> Self {
        Self {
            eviction_sweep_secs: env_usize("REGISTRY_EVICTION_SWEEP_SECS", 300) as u64,
            probe_timeout_secs: env_usize("REGISTRY_PROBE_TIMEOUT_SECS", 5) as u64,
        }
    }
}
