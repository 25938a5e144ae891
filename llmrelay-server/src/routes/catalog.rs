//! `GET/PUT /api/providers`, `/api/models`, `/api/budgets/:period` — CRUD
//! over the catalog tables the router and pipeline read from. Thin
//! wrappers: all the validation already lives in `llmrelay-store`.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};

use llmrelay_catalog::{BudgetConfig, BudgetPeriod, ModelConfig, ProviderConfig};

use crate::app::AppState;
use crate::error::ApiError;

pub async fn list_providers(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_providers().await?))
}

pub async fn upsert_provider(
    State(state): State<AppState>,
    Json(provider): Json<ProviderConfig>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.upsert_provider(&provider).await?;
    Ok(Json(provider))
}

pub async fn list_models(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_models().await?))
}

pub async fn upsert_model(
    State(state): State<AppState>,
    Json(model): Json<ModelConfig>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.store.upsert_model(&model).await?;
    Ok(Json(ModelConfig { id, ..model }))
}

pub async fn get_budget(
    State(state): State<AppState>,
    Path(period): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let period = parse_period(&period)?;
    match state.store.get_budget(period).await? {
        Some(budget) => Ok(Json(budget)),
        None => Err(ApiError::new(
            axum::http::StatusCode::NOT_FOUND,
            "not_found",
            format!("no budget configured for {period:?}"),
        )),
    }
}

pub async fn upsert_budget(
    State(state): State<AppState>,
    Path(period): Path<String>,
    Json(mut budget): Json<BudgetConfig>,
) -> Result<impl IntoResponse, ApiError> {
    budget.period = parse_period(&period)?;
    state.store.upsert_budget(&budget).await?;
    Ok(Json(budget))
}

fn parse_period(raw: &str) -> Result<BudgetPeriod, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "daily" => Ok(BudgetPeriod::Daily),
        "weekly" => Ok(BudgetPeriod::Weekly),
        "monthly" => Ok(BudgetPeriod::Monthly),
        other => Err(ApiError::new(
            axum::http::StatusCode::BAD_REQUEST,
            "invalid_request",
            format!("unknown budget period {other:?}"),
        )),
    }
}
