//! The resolution-priority ladder: turns a requested model name plus a
//! precomputed classification into a concrete (provider, model) pick.

use llmrelay_catalog::{ModelConfig, Tier};
use llmrelay_store::Store;

use crate::classifier::Category;

use super::selection::{select_for_tier, SelectionOutcome};

const DEFAULT_FALLBACK_PROVIDER: &str = "claude-cli";
const DEFAULT_FALLBACK_MODEL: &str = "sonnet";

/// History window for both `model_stats_for_tier` and `recent_outcomes`:
/// the router only trusts success/failure data from the last 7 days.
const STATS_WINDOW_DAYS: i64 = 7;

const CLAUDE_ALIASES: &[(&str, &str)] = &[
    ("opus", "claude-3-opus"),
    ("sonnet", "claude-3-5-sonnet"),
    ("haiku", "claude-3-5-haiku"),
];

const LEGACY_TIER_MAP: &[(&str, Tier)] = &[
    ("gpt-4", Tier::Premium),
    ("gpt-4-turbo", Tier::Standard),
    ("gpt-3.5-turbo", Tier::Economy),
    ("gpt-4o", Tier::Standard),
    ("gpt-4o-mini", Tier::Economy),
];

pub struct RouteRequest {
    pub requested_model: String,
    pub category: Category,
    pub complexity: u8,
    pub default_provider: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub provider_id: String,
    pub model_id: String,
    pub display_alias: String,
    pub reason: String,
    pub category: Category,
    pub complexity: u8,
}

impl RouteDecision {
    fn from_model(model: &ModelConfig, reason: impl Into<String>, category: Category, complexity: u8) -> Self {
        Self {
            provider_id: model.provider_id.clone(),
            model_id: model.model_id.clone(),
            display_alias: model.pinned_name(),
            reason: reason.into(),
            category,
            complexity,
        }
    }

    fn hard_default(category: Category, complexity: u8) -> Self {
        Self {
            provider_id: DEFAULT_FALLBACK_PROVIDER.into(),
            model_id: DEFAULT_FALLBACK_MODEL.into(),
            display_alias: format!("{DEFAULT_FALLBACK_PROVIDER}:{DEFAULT_FALLBACK_MODEL}"),
            reason: "hard default: no enabled model in any tier".into(),
            category,
            complexity,
        }
    }
}

fn claude_alias_model_id(requested: &str) -> Option<&'static str> {
    let lower = requested.to_ascii_lowercase();
    CLAUDE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, model_id)| *model_id)
}

fn legacy_tier(requested: &str) -> Option<Tier> {
    let lower = requested.to_ascii_lowercase();
    LEGACY_TIER_MAP.iter().find(|(name, _)| *name == lower).map(|(_, tier)| *tier)
}

/// Resolves `req.requested_model` through the six-step priority ladder,
/// falling through to tier-based selection (with exploration/exploitation
/// over history) when nothing more specific matches.
pub async fn resolve(store: &Store, req: &RouteRequest) -> Result<RouteDecision, llmrelay_store::StoreError> {
    // 1. Explicit `provider:model` pin.
    if let Some((provider, model)) = req.requested_model.split_once(':') {
        if let Some(found) = store.find_model(provider, model).await? {
            return Ok(RouteDecision::from_model(&found, "explicit provider:model pin", req.category, req.complexity));
        }
    }

    // 2. Explicit Claude alias: claude-api first, claude-cli second.
    if let Some(alias_model_id) = claude_alias_model_id(&req.requested_model) {
        if let Some(found) = store.find_model("claude-api", alias_model_id).await? {
            return Ok(RouteDecision::from_model(&found, "explicit Claude alias (claude-api)", req.category, req.complexity));
        }
        if let Some(found) = store.find_model("claude-cli", alias_model_id).await? {
            return Ok(RouteDecision::from_model(&found, "explicit Claude alias (claude-cli)", req.category, req.complexity));
        }
    }

    // 3. Bare model id matching some enabled provider's catalog.
    if let Some(found) = store.find_model_by_id(&req.requested_model).await? {
        return Ok(RouteDecision::from_model(&found, "model id matched enabled catalog entry", req.category, req.complexity));
    }

    // 4. Tier name.
    let tier = if let Ok(tier) = req.requested_model.parse::<Tier>() {
        Some(tier)
    // 5. Known legacy name mapped to a tier.
    } else if let Some(tier) = legacy_tier(&req.requested_model) {
        Some(tier)
    // 6. `auto` or unknown: tier from classified complexity.
    } else {
        Some(Tier::from_complexity(req.complexity))
    };

    tier_based_resolve(store, tier.expect("always Some by this point"), req).await
}

async fn tier_based_resolve(
    store: &Store,
    starting_tier: Tier,
    req: &RouteRequest,
) -> Result<RouteDecision, llmrelay_store::StoreError> {
    let mut tier = starting_tier;
    loop {
        let candidates = store.models_for_tier(tier).await?;
        if !candidates.is_empty() {
            return Ok(select_within_tier(store, tier, candidates, req).await?);
        }
        match tier.escalate() {
            Some(next) => tier = next,
            None => return Ok(RouteDecision::hard_default(req.category, req.complexity)),
        }
    }
}

async fn select_within_tier(
    store: &Store,
    tier: Tier,
    candidates: Vec<ModelConfig>,
    req: &RouteRequest,
) -> Result<RouteDecision, llmrelay_store::StoreError> {
    let window_start = chrono::Utc::now() - chrono::Duration::days(STATS_WINDOW_DAYS);
    let stats = store.model_stats_for_tier(tier.alias(), req.category.as_str(), window_start).await?;

    let mut consecutive_failures = Vec::new();
    for model in &candidates {
        let outcomes = store
            .recent_outcomes(&model.provider_id, &model.model_id, req.category.as_str(), 3)
            .await?;
        if outcomes.len() == 3 && outcomes.iter().all(|ok| !ok) {
            consecutive_failures.push((model.provider_id.clone(), model.model_id.clone()));
        }
    }

    let roll: f64 = rand::random();
    let outcome = select_for_tier(&candidates, &stats, &req.default_provider, roll, &consecutive_failures);

    Ok(match outcome {
        SelectionOutcome::Explore { model } => {
            RouteDecision::from_model(&model, format!("Explore {} (no confident history yet)", model.pinned_name()), req.category, req.complexity)
        }
        SelectionOutcome::Exploit { model } => {
            RouteDecision::from_model(&model, format!("Selected {} on historical success", model.pinned_name()), req.category, req.complexity)
        }
        SelectionOutcome::Fallback { model } => {
            RouteDecision::from_model(&model, format!("Fallback to cheapest {} model", tier.alias()), req.category, req.complexity)
        }
        SelectionOutcome::NoModelsInTier => RouteDecision::hard_default(req.category, req.complexity),
    })
}
