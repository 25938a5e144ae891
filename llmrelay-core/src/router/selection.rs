//! Tier-based model selection: cost-ordered exploration/exploitation over
//! historical success stats, per §4.4.

use llmrelay_catalog::ModelConfig;
use llmrelay_store::ModelStats;

const CONFIDENCE_SAMPLE_THRESHOLD: u32 = 3;
const SUCCESS_RATE_THRESHOLD: f64 = 0.8;
const EXPLORATION_PROBABILITY: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Explore { model: ModelConfig },
    Exploit { model: ModelConfig },
    Fallback { model: ModelConfig },
    NoModelsInTier,
}

fn is_confident(stats: Option<&ModelStats>) -> bool {
    stats.map(|s| s.total_requests >= CONFIDENCE_SAMPLE_THRESHOLD).unwrap_or(false)
}

fn stats_for<'a>(models_stats: &'a [ModelStats], model: &ModelConfig) -> Option<&'a ModelStats> {
    models_stats
        .iter()
        .find(|s| s.provider_id == model.provider_id && s.model_id == model.model_id)
}

/// Selects a model within `tier` from `candidates` (already filtered to
/// enabled models of that tier and sorted by input cost ascending by the
/// caller's catalog query), using `stats` (category-scoped, last 7 days).
///
/// `roll` is the exploration dice roll in `[0, 1)`, injected so the
/// exploration branch is deterministic under test. `consecutive_failures`
/// lists `(provider_id, model_id)` pairs whose last 3 outcomes were all
/// failures; those are skipped in the exploitation branch even if their
/// aggregate stats would otherwise qualify.
pub fn select_for_tier(
    candidates: &[ModelConfig],
    stats: &[ModelStats],
    default_provider: &str,
    roll: f64,
    consecutive_failures: &[(String, String)],
) -> SelectionOutcome {
    if candidates.is_empty() {
        return SelectionOutcome::NoModelsInTier;
    }

    let has_untested = candidates.iter().any(|m| !is_confident(stats_for(stats, m)));
    if has_untested && roll < EXPLORATION_PROBABILITY {
        let cheapest_untested = candidates
            .iter()
            .find(|m| !is_confident(stats_for(stats, m)))
            .expect("has_untested guarantees a match");
        return SelectionOutcome::Explore {
            model: cheapest_untested.clone(),
        };
    }

    for model in candidates {
        let Some(model_stats) = stats_for(stats, model) else {
            continue;
        };
        if !is_confident(Some(model_stats)) {
            continue;
        }
        if model_stats.success_rate() < SUCCESS_RATE_THRESHOLD {
            continue;
        }
        let has_failed_thrice = consecutive_failures
            .iter()
            .any(|(p, m)| p == &model.provider_id && m == &model.model_id);
        if has_failed_thrice {
            continue;
        }
        return SelectionOutcome::Exploit { model: model.clone() };
    }

    let fallback = candidates
        .iter()
        .find(|m| m.provider_id == default_provider)
        .unwrap_or(&candidates[0]);
    SelectionOutcome::Fallback {
        model: fallback.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_catalog::{Capabilities, Tier};

    fn model(provider: &str, id: &str, cost: f64) -> ModelConfig {
        ModelConfig {
            id: 1,
            provider_id: provider.into(),
            model_id: id.into(),
            display_name: id.into(),
            tier: Tier::Economy,
            input_cost_per_million: cost,
            output_cost_per_million: cost,
            max_context_tokens: 100_000,
            capabilities: Capabilities::default(),
            enabled: true,
        }
    }

    fn stats(provider: &str, id: &str, total: u32, successful: u32) -> ModelStats {
        ModelStats {
            provider_id: provider.into(),
            model_id: id.into(),
            total_requests: total,
            successful_requests: successful,
            avg_latency_ms: None,
        }
    }

    #[test]
    fn zero_history_with_high_roll_falls_back_to_cheapest() {
        let candidates = vec![model("openai", "a", 0.1), model("anthropic", "b", 0.2)];
        let outcome = select_for_tier(&candidates, &[], "openai", 0.99, &[]);
        assert!(matches!(outcome, SelectionOutcome::Fallback { model } if model.model_id == "a"));
    }

    #[test]
    fn low_roll_with_untested_model_explores() {
        let candidates = vec![model("openai", "a", 0.1)];
        let outcome = select_for_tier(&candidates, &[], "openai", 0.01, &[]);
        assert!(matches!(outcome, SelectionOutcome::Explore { .. }));
    }

    #[test]
    fn two_samples_is_below_confidence_threshold() {
        let candidates = vec![model("anthropic", "haiku", 0.1)];
        let stats = vec![stats("anthropic", "haiku", 2, 2)];
        let outcome = select_for_tier(&candidates, &stats, "anthropic", 0.99, &[]);
        assert!(matches!(outcome, SelectionOutcome::Fallback { .. }));
    }

    #[test]
    fn three_confident_samples_at_high_success_rate_exploits() {
        let candidates = vec![model("anthropic", "haiku", 0.1)];
        let stats = vec![stats("anthropic", "haiku", 3, 3)];
        let outcome = select_for_tier(&candidates, &stats, "anthropic", 0.99, &[]);
        assert!(matches!(outcome, SelectionOutcome::Exploit { model } if model.model_id == "haiku"));
    }

    #[test]
    fn low_success_rate_is_skipped_in_exploitation() {
        let candidates = vec![model("anthropic", "haiku", 0.1), model("openai", "mini", 0.2)];
        let stats = vec![
            stats("anthropic", "haiku", 10, 5),
            stats("openai", "mini", 5, 5),
        ];
        let outcome = select_for_tier(&candidates, &stats, "anthropic", 0.99, &[]);
        assert!(matches!(outcome, SelectionOutcome::Exploit { model } if model.model_id == "mini"));
    }

    #[test]
    fn consecutive_failures_skip_an_otherwise_qualifying_model() {
        let candidates = vec![model("anthropic", "haiku", 0.1), model("openai", "mini", 0.2)];
        let stats = vec![
            stats("anthropic", "haiku", 10, 9),
            stats("openai", "mini", 5, 5),
        ];
        let failures = vec![("anthropic".to_string(), "haiku".to_string())];
        let outcome = select_for_tier(&candidates, &stats, "anthropic", 0.99, &failures);
        assert!(matches!(outcome, SelectionOutcome::Exploit { model } if model.model_id == "mini"));
    }
}
