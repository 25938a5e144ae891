//! `GET /v1/models` — OpenAI-compatible model listing clients use to
//! populate a model picker. Combines the router's static tier aliases with
//! the enabled catalog, per §6.

use std::collections::HashSet;

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;

const STATIC_ALIASES: &[&str] = &["auto", "economy", "standard", "premium", "opus", "sonnet", "haiku"];

#[derive(Serialize)]
struct ModelEntry {
    id: String,
    object: &'static str,
    created: i64,
    owned_by: String,
}

pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let models = state.store.list_models().await?;
    let mut seen = HashSet::new();
    let mut data = Vec::new();

    for alias in STATIC_ALIASES {
        if seen.insert(alias.to_string()) {
            data.push(ModelEntry { id: alias.to_string(), object: "model", created: 0, owned_by: "llmrelay".to_string() });
        }
    }

    for model in models.iter().filter(|m| m.enabled) {
        if seen.insert(model.model_id.clone()) {
            data.push(ModelEntry {
                id: model.model_id.clone(),
                object: "model",
                created: model.id,
                owned_by: model.provider_id.clone(),
            });
        }
        let pinned = model.pinned_name();
        if seen.insert(pinned.clone()) {
            data.push(ModelEntry { id: pinned, object: "model", created: model.id, owned_by: model.provider_id.clone() });
        }
    }

    Ok(Json(serde_json::json!({ "object": "list", "data": data })))
}
