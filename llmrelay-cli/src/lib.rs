//! Bootstrap for the llmrelay binary: config loading, provider registry
//! construction, and tracing setup. Kept as a library so the bootstrap
//! logic is testable without spawning the real `main`.

mod bootstrap;
mod log_format;

pub use bootstrap::build_provider_registry;
pub use log_format::TextWithSpanIds;

use std::path::Path;
use std::sync::Arc;

use llmrelay_config::Settings;
use llmrelay_core::{Pipeline, ProviderRegistry};
use llmrelay_server::AppState;
use llmrelay_store::Store;

const DEFAULT_DB_PATH: &str = "llmrelay.db";

/// Loads env/XDG config, opens the catalog store, and assembles the shared
/// [`AppState`] the HTTP server is built from.
pub fn bootstrap(override_dir: Option<&Path>) -> anyhow::Result<AppState> {
    llmrelay_config::load_and_apply("llmrelay", override_dir)?;

    let db_path = std::env::var("LLMRELAY_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    let store = Store::open(&db_path)?;

    let llm_classifier_enabled = std::env::var("LLM_CLASSIFIER").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    let settings = Arc::new(Settings::new(llm_classifier_enabled, None));

    Ok(AppState { pipeline: Arc::new(Pipeline::new(store.clone(), ProviderRegistry::new())), store, settings })
}

/// Re-registers every enabled provider from the catalog into a fresh
/// registry and swaps it into a new [`Pipeline`] built on the same store
/// and activity history. Called once at startup, after `bootstrap` has
/// opened the store, and again whenever the provider table changes enough
/// to warrant a restart.
pub async fn refresh_providers(state: &mut AppState) -> anyhow::Result<()> {
    let providers = state.store.list_providers().await?;
    let registry = build_provider_registry(&providers);
    state.pipeline = Arc::new(Pipeline::new(state.store.clone(), registry));
    Ok(())
}
