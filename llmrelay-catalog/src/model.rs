//! Model catalog entry: one row per `(provider_id, model_id)`.

use serde::{Deserialize, Serialize};

use crate::Tier;

/// Capability flags a model may advertise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub tools: bool,
    #[serde(default)]
    pub vision: bool,
}

/// One catalog row: a model as a specific provider exposes it.
///
/// Constraint: `(provider_id, model_id)` is unique (enforced by
/// `llmrelay-store`'s schema, not by this type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: i64,
    pub provider_id: String,
    /// Model id as understood by the upstream (e.g. `"gpt-4o-mini"`).
    pub model_id: String,
    pub display_name: String,
    pub tier: Tier,
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
    pub max_context_tokens: u32,
    pub capabilities: Capabilities,
    pub enabled: bool,
}

impl ModelConfig {
    /// Estimated USD cost of one call from token counts, per spec §4.2's
    /// `estimateCost(model_id, tokens)`.
    pub fn estimate_cost(&self, tokens_in: u32, tokens_out: u32) -> f64 {
        let input = tokens_in as f64 / 1_000_000.0 * self.input_cost_per_million;
        let output = tokens_out as f64 / 1_000_000.0 * self.output_cost_per_million;
        input + output
    }

    /// `"provider:model"` pin form accepted by the router's resolution priority 1.
    pub fn pinned_name(&self) -> String {
        format!("{}:{}", self.provider_id, self.model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> ModelConfig {
        ModelConfig {
            id: 1,
            provider_id: "openai".into(),
            model_id: "gpt-4o-mini".into(),
            display_name: "GPT-4o mini".into(),
            tier: Tier::Economy,
            input_cost_per_million: 0.15,
            output_cost_per_million: 0.60,
            max_context_tokens: 128_000,
            capabilities: Capabilities {
                streaming: true,
                tools: true,
                vision: false,
            },
            enabled: true,
        }
    }

    #[test]
    fn estimate_cost_sums_input_and_output() {
        let m = fixture();
        let cost = m.estimate_cost(1_000_000, 1_000_000);
        assert!((cost - 0.75).abs() < 1e-9);
    }

    #[test]
    fn estimate_cost_zero_tokens_is_zero() {
        assert_eq!(fixture().estimate_cost(0, 0), 0.0);
    }

    #[test]
    fn pinned_name_joins_provider_and_model() {
        assert_eq!(fixture().pinned_name(), "openai:gpt-4o-mini");
    }
}
