//! Provider configuration: one row per upstream provider kind.

use serde::{Deserialize, Serialize};

/// Upstream provider kind, as configured by the (external) settings surface.
///
/// **Interaction**: the router and provider registry look models up by
/// `provider_id`; `config` carries credentials/base-url and is opaque to
/// everything except the adapter that owns that provider kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable key, e.g. `"openai"`, `"anthropic"`, `"claude-cli"`.
    pub provider_id: String,
    pub display_name: String,
    pub enabled: bool,
    /// Lower sorts first when multiple providers tie on cost.
    pub priority: i32,
    /// Opaque JSON blob: API key, base URL, CLI binary path, etc.
    pub config: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ProviderConfig {
    /// Reads a string field out of `config`, falling back to an environment
    /// variable named `env_key` (spec §6: "credentials resolved from
    /// provider-config JSON with env-var fallbacks").
    pub fn config_str_or_env(&self, field: &str, env_key: &str) -> Option<String> {
        self.config
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| std::env::var(env_key).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(config: serde_json::Value) -> ProviderConfig {
        ProviderConfig {
            provider_id: "openai".into(),
            display_name: "OpenAI".into(),
            enabled: true,
            priority: 0,
            config,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn config_field_wins_over_env() {
        std::env::set_var("CATALOG_TEST_KEY", "from_env");
        let p = fixture(serde_json::json!({"api_key": "from_config"}));
        assert_eq!(
            p.config_str_or_env("api_key", "CATALOG_TEST_KEY").as_deref(),
            Some("from_config")
        );
        std::env::remove_var("CATALOG_TEST_KEY");
    }

    #[test]
    fn falls_back_to_env_when_field_missing() {
        std::env::set_var("CATALOG_TEST_KEY2", "from_env");
        let p = fixture(serde_json::json!({}));
        assert_eq!(
            p.config_str_or_env("api_key", "CATALOG_TEST_KEY2").as_deref(),
            Some("from_env")
        );
        std::env::remove_var("CATALOG_TEST_KEY2");
    }
}
