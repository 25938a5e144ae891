//! Wires a [`ProviderRegistry`] from whatever is currently sitting in the
//! catalog's `providers` table. Each row names a `provider_id`; we match it
//! against the adapter that speaks that upstream's wire protocol and read
//! its credentials out of the row's config blob, falling back to the
//! matching env var per provider (`ProviderConfig::config_str_or_env`).

use std::sync::Arc;

use llmrelay_catalog::ProviderConfig;
use llmrelay_core::{AnthropicAdapter, ClaudeCliAdapter, DispatchMode, GeminiAdapter, OllamaAdapter, OpenAiAdapter, ProviderAdapter, ProviderRegistry};
use tracing::warn;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_CLAUDE_CLI_BINARY: &str = "claude";

fn build_adapter(config: &ProviderConfig) -> Option<Arc<dyn ProviderAdapter>> {
    match config.provider_id.as_str() {
        "openai" => {
            let base_url = config.config_str_or_env("base_url", "OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into());
            let api_key = config.config_str_or_env("api_key", "OPENAI_API_KEY")?;
            Some(Arc::new(OpenAiAdapter::new(base_url, api_key)))
        }
        "anthropic" => {
            let base_url = config
                .config_str_or_env("base_url", "ANTHROPIC_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_BASE_URL.into());
            let api_key = config.config_str_or_env("api_key", "ANTHROPIC_API_KEY")?;
            Some(Arc::new(AnthropicAdapter::new(base_url, api_key)))
        }
        "gemini" => {
            let base_url = config.config_str_or_env("base_url", "GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.into());
            let api_key = config.config_str_or_env("api_key", "GEMINI_API_KEY")?;
            Some(Arc::new(GeminiAdapter::new(base_url, api_key)))
        }
        "ollama" => {
            let base_url = config.config_str_or_env("base_url", "OLLAMA_BASE_URL").unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.into());
            Some(Arc::new(OllamaAdapter::new(base_url)))
        }
        "claude-cli" => {
            let binary = config
                .config_str_or_env("binary", "CLAUDE_CLI_BINARY")
                .unwrap_or_else(|| DEFAULT_CLAUDE_CLI_BINARY.into());
            let mode = match config.config_str_or_env("dispatch_mode", "CLAUDE_CLI_DISPATCH_MODE").as_deref() {
                Some("pinned") => DispatchMode::Pinned,
                Some("ephemeral") => DispatchMode::Ephemeral,
                _ => DispatchMode::WarmPool,
            };
            Some(Arc::new(ClaudeCliAdapter::new(binary, mode)))
        }
        _ => None,
    }
}

/// Builds a registry from every enabled provider row, skipping (with a
/// warning) any row whose credential is missing or whose kind has no
/// matching adapter.
pub fn build_provider_registry(providers: &[ProviderConfig]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for config in providers.iter().filter(|p| p.enabled) {
        match build_adapter(config) {
            Some(adapter) => registry.register(adapter),
            None => warn!(provider_id = %config.provider_id, "skipping provider: missing credential or unknown kind"),
        }
    }
    registry
}
