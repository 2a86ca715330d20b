// src/config/ai.rs
// Per-provider LLM configuration, mirroring the `ai.<provider>.*` keys.

use serde::{Deserialize, Serialize};

use super::helpers::env_or;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub api_key: String,
    pub model: String,
    pub url: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    fn from_env_prefixed(prefix: &str, default_model: &str, default_url: &str) -> Self {
        let api_key = env_or(&format!("AI_{prefix}_API_KEY"), "");
        Self {
            enabled: !api_key.is_empty(),
            api_key,
            model: env_or(&format!("AI_{prefix}_MODEL"), default_model),
            url: env_or(&format!("AI_{prefix}_URL"), default_url),
            timeout_secs: env_or(&format!("AI_{prefix}_TIMEOUT_SECS"), "60")
                .parse()
                .unwrap_or(60),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }

    pub fn validate(&self, provider: &str) -> anyhow::Result<()> {
        if self.enabled && self.api_key.is_empty() {
            anyhow::bail!("AI_{}_API_KEY is required when {} is enabled", provider.to_uppercase(), provider);
        }
        if self.enabled && url::Url::parse(&self.url).is_err() {
            anyhow::bail!("AI_{}_URL is not a valid URL: {}", provider.to_uppercase(), self.url);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub gemini: ProviderConfig,
    pub claude: ProviderConfig,
    pub openai: ProviderConfig,
    pub eren: ProviderConfig,
    pub default_provider: Option<String>,
}

impl AiConfig {
    pub fn from_env() -> Self {
        Self {
            gemini: ProviderConfig::from_env_prefixed(
                "GEMINI",
                "gemini-2.0-flash",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            claude: ProviderConfig::from_env_prefixed(
                "CLAUDE",
                "claude-3-5-sonnet-latest",
                "https://api.anthropic.com/v1",
            ),
            openai: ProviderConfig::from_env_prefixed(
                "OPENAI",
                "gpt-4o",
                "https://api.openai.com/v1",
            ),
            eren: ProviderConfig::from_env_prefixed("EREN", "eren-default", "https://api.eren.ai/v1"),
            default_provider: std::env::var("AI_DEFAULT_PROVIDER").ok(),
        }
    }

    /// Known provider list, fixed order: the first configured among them
    /// is used unless an explicit default is requested.
    pub fn known_providers(&self) -> [(&'static str, &ProviderConfig); 4] {
        [
            ("gemini", &self.gemini),
            ("claude", &self.claude),
            ("openai", &self.openai),
            ("eren", &self.eren),
        ]
    }

    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        self.known_providers()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c)
    }

    pub fn default_provider(&self) -> Option<String> {
        if let Some(explicit) = &self.default_provider {
            if self.get(explicit).map(|c| c.is_configured()).unwrap_or(false) {
                return Some(explicit.clone());
            }
        }
        self.known_providers()
            .into_iter()
            .find(|(_, c)| c.is_configured())
            .map(|(name, _)| name.to_string())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.gemini.validate("gemini")?;
        self.claude.validate("claude")?;
        self.openai.validate("openai")?;
        self.eren.validate("eren")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(name: &str) -> ProviderConfig {
        ProviderConfig {
            enabled: true,
            api_key: format!("{name}-key"),
            model: "m".to_string(),
            url: "https://example.com".to_string(),
            timeout_secs: 60,
        }
    }

    fn unconfigured() -> ProviderConfig {
        ProviderConfig {
            enabled: false,
            api_key: String::new(),
            model: "m".to_string(),
            url: "https://example.com".to_string(),
            timeout_secs: 60,
        }
    }

    #[test]
    fn default_provider_picks_first_configured_in_known_order() {
        let cfg = AiConfig {
            gemini: unconfigured(),
            claude: configured("claude"),
            openai: configured("openai"),
            eren: unconfigured(),
            default_provider: None,
        };
        assert_eq!(cfg.default_provider(), Some("claude".to_string()));
    }

    #[test]
    fn explicit_default_provider_wins_when_configured() {
        let cfg = AiConfig {
            gemini: configured("gemini"),
            claude: configured("claude"),
            openai: unconfigured(),
            eren: unconfigured(),
            default_provider: Some("claude".to_string()),
        };
        assert_eq!(cfg.default_provider(), Some("claude".to_string()));
    }

    #[test]
    fn no_provider_configured_returns_none() {
        let cfg = AiConfig {
            gemini: unconfigured(),
            claude: unconfigured(),
            openai: unconfigured(),
            eren: unconfigured(),
            default_provider: None,
        };
        assert_eq!(cfg.default_provider(), None);
    }
}
