//! `GET/PUT /api/settings` — the two runtime toggles the relay exposes
//! without a restart: whether ambiguous prompts escalate to an LLM
//! classifier call, and an optional `provider:model` pin that bypasses
//! routing entirely.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Serialize, Deserialize)]
pub struct SettingsBody {
    pub llm_classifier_enabled: bool,
    pub pinned_model: Option<String>,
}

pub async fn get(State(state): State<AppState>) -> impl IntoResponse {
    Json(SettingsBody {
        llm_classifier_enabled: state.settings.llm_classifier_enabled(),
        pinned_model: state.settings.pinned_model(),
    })
}

pub async fn put(State(state): State<AppState>, Json(body): Json<SettingsBody>) -> Result<impl IntoResponse, ApiError> {
    state.settings.set_llm_classifier_enabled(body.llm_classifier_enabled);
    state.settings.set_pinned_model(body.pinned_model);
    Ok(Json(SettingsBody {
        llm_classifier_enabled: state.settings.llm_classifier_enabled(),
        pinned_model: state.settings.pinned_model(),
    }))
}
