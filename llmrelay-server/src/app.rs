//! Axum app: shared state and the route table.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use llmrelay_config::Settings;
use llmrelay_core::Pipeline;
use llmrelay_store::Store;

use crate::routes;

/// Shared across every request handler. Cheap to clone (everything inside
/// is already reference-counted or a handle).
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub store: Store,
    pub settings: Arc<Settings>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(routes::chat::completions))
        .route("/v1/models", get(routes::models::list))
        .route("/api/stats", get(routes::stats::summary))
        .route("/api/activity/stream", get(routes::activity::stream))
        .route("/api/feedback", post(routes::feedback::submit))
        .route("/api/settings", get(routes::settings::get).put(routes::settings::put))
        .route(
            "/api/providers",
            get(routes::catalog::list_providers).put(routes::catalog::upsert_provider),
        )
        .route("/api/models", get(routes::catalog::list_models).put(routes::catalog::upsert_model))
        .route(
            "/api/budgets/:period",
            get(routes::catalog::get_budget).put(routes::catalog::upsert_budget),
        )
        .with_state(state)
}
