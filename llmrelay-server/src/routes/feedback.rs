//! `POST /api/feedback` — the same `/feedback <score> [id]` grammar the
//! chat pipeline recognizes inline, exposed as its own endpoint for UIs
//! that show a thumbs up/down control next to each past response.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use llmrelay_core::feedback;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct FeedbackBody {
    pub text: String,
}

pub async fn submit(State(state): State<AppState>, Json(body): Json<FeedbackBody>) -> Result<impl IntoResponse, ApiError> {
    let command = feedback::parse(&body.text)
        .map_err(|err| ApiError::new(axum::http::StatusCode::BAD_REQUEST, "malformed_feedback", err.to_string()))?;
    let message = feedback::apply(&state.store, &command)
        .await
        .map_err(|err| ApiError::new(axum::http::StatusCode::NOT_FOUND, "not_found", err.to_string()))?;
    Ok(Json(serde_json::json!({ "message": message })))
}
