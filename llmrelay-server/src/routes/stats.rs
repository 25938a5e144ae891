//! `GET /api/stats` — rollup for the dashboard: recent request volume,
//! success rate, and spend against each configured budget.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use chrono::{Duration, Utc};
use serde::Serialize;

use llmrelay_catalog::BudgetPeriod;

use crate::app::AppState;
use crate::error::ApiError;

const RECENT_REQUEST_LIMIT: u32 = 200;

#[derive(Serialize)]
struct BudgetUsage {
    period: &'static str,
    limit_usd: f64,
    spend_usd: f64,
    enabled: bool,
}

#[derive(Serialize)]
struct StatsSummary {
    total_requests: usize,
    successful_requests: usize,
    cache_hits: usize,
    total_cost_usd: f64,
    budgets: Vec<BudgetUsage>,
}

pub async fn summary(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let recent = state.store.recent_requests(RECENT_REQUEST_LIMIT).await?;
    let total_requests = recent.len();
    let successful_requests = recent.iter().filter(|r| r.success == Some(true)).count();
    let cache_hits = recent.iter().filter(|r| r.cache_hit).count();
    let total_cost_usd = recent.iter().map(|r| r.cost_usd).sum();

    let mut budgets = Vec::new();
    for (period, label, window) in [
        (BudgetPeriod::Daily, "daily", Duration::days(1)),
        (BudgetPeriod::Weekly, "weekly", Duration::days(7)),
        (BudgetPeriod::Monthly, "monthly", Duration::days(30)),
    ] {
        if let Some(budget) = state.store.get_budget(period).await? {
            let spend_usd = state.store.spend_since(Utc::now() - window).await?;
            budgets.push(BudgetUsage { period: label, limit_usd: budget.limit_usd, spend_usd, enabled: budget.enabled });
        }
    }

    Ok(Json(StatsSummary { total_requests, successful_requests, cache_hits, total_cost_usd, budgets }))
}
