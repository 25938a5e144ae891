//! CRUD for the provider/model/budget catalog tables.

use chrono::{DateTime, Utc};
use llmrelay_catalog::{BudgetConfig, BudgetPeriod, Capabilities, ModelConfig, ProviderConfig, Tier};
use rusqlite::{params, OptionalExtension};
use std::str::FromStr as _;

use crate::error::StoreError;
use crate::store::Store;

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl Store {
    pub async fn upsert_provider(&self, provider: &ProviderConfig) -> Result<(), StoreError> {
        let provider = provider.clone();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO providers (provider_id, display_name, enabled, priority, config, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(provider_id) DO UPDATE SET
                    display_name = excluded.display_name,
                    enabled = excluded.enabled,
                    priority = excluded.priority,
                    config = excluded.config,
                    updated_at = excluded.updated_at",
                params![
                    provider.provider_id,
                    provider.display_name,
                    provider.enabled,
                    provider.priority,
                    provider.config.to_string(),
                    provider.created_at.to_rfc3339(),
                    provider.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub async fn list_providers(&self) -> Result<Vec<ProviderConfig>, StoreError> {
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare(
                "SELECT provider_id, display_name, enabled, priority, config, created_at, updated_at
                 FROM providers ORDER BY priority ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let config_str: String = row.get(4)?;
                let created_at: String = row.get(5)?;
                let updated_at: String = row.get(6)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, i32>(3)?,
                    config_str,
                    created_at,
                    updated_at,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (provider_id, display_name, enabled, priority, config_str, created_at, updated_at) =
                    row?;
                out.push(ProviderConfig {
                    provider_id,
                    display_name,
                    enabled,
                    priority,
                    config: serde_json::from_str(&config_str)?,
                    created_at: parse_ts(&created_at),
                    updated_at: parse_ts(&updated_at),
                });
            }
            Ok(out)
        })
    }

    pub async fn upsert_model(&self, model: &ModelConfig) -> Result<i64, StoreError> {
        let model = model.clone();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO models (provider_id, model_id, display_name, tier, input_cost_per_million,
                    output_cost_per_million, max_context_tokens, streaming, tools, vision, enabled)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(provider_id, model_id) DO UPDATE SET
                    display_name = excluded.display_name,
                    tier = excluded.tier,
                    input_cost_per_million = excluded.input_cost_per_million,
                    output_cost_per_million = excluded.output_cost_per_million,
                    max_context_tokens = excluded.max_context_tokens,
                    streaming = excluded.streaming,
                    tools = excluded.tools,
                    vision = excluded.vision,
                    enabled = excluded.enabled",
                params![
                    model.provider_id,
                    model.model_id,
                    model.display_name,
                    model.tier.alias(),
                    model.input_cost_per_million,
                    model.output_cost_per_million,
                    model.max_context_tokens,
                    model.capabilities.streaming,
                    model.capabilities.tools,
                    model.capabilities.vision,
                    model.enabled,
                ],
            )?;
            let id = conn.query_row(
                "SELECT id FROM models WHERE provider_id = ?1 AND model_id = ?2",
                params![model.provider_id, model.model_id],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub async fn list_models(&self) -> Result<Vec<ModelConfig>, StoreError> {
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare(
                "SELECT id, provider_id, model_id, display_name, tier, input_cost_per_million,
                    output_cost_per_million, max_context_tokens, streaming, tools, vision, enabled
                 FROM models ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], row_to_model)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    /// Models enabled and belonging to enabled providers for a given tier,
    /// ordered by provider priority (router's resolution-priority ladder
    /// walks this list for exploration/exploitation candidates).
    pub async fn models_for_tier(&self, tier: Tier) -> Result<Vec<ModelConfig>, StoreError> {
        let tier_str = tier.alias().to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare(
                "SELECT m.id, m.provider_id, m.model_id, m.display_name, m.tier, m.input_cost_per_million,
                    m.output_cost_per_million, m.max_context_tokens, m.streaming, m.tools, m.vision, m.enabled
                 FROM models m
                 JOIN providers p ON p.provider_id = m.provider_id
                 WHERE m.tier = ?1 AND m.enabled = 1 AND p.enabled = 1
                 ORDER BY p.priority ASC",
            )?;
            let rows = stmt.query_map(params![tier_str], row_to_model)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    /// Exact `(provider_id, model_id)` lookup, enabled providers/models only.
    /// Backs the router's explicit `provider:model` pin (resolution priority 1).
    pub async fn find_model(&self, provider_id: &str, model_id: &str) -> Result<Option<ModelConfig>, StoreError> {
        let provider_id = provider_id.to_string();
        let model_id = model_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            conn.query_row(
                "SELECT m.id, m.provider_id, m.model_id, m.display_name, m.tier, m.input_cost_per_million,
                    m.output_cost_per_million, m.max_context_tokens, m.streaming, m.tools, m.vision, m.enabled
                 FROM models m
                 JOIN providers p ON p.provider_id = m.provider_id
                 WHERE m.provider_id = ?1 AND m.model_id = ?2 AND m.enabled = 1 AND p.enabled = 1",
                params![provider_id, model_id],
                row_to_model,
            )
            .optional()
            .map_err(StoreError::from)
        })
    }

    /// Bare model id lookup across every enabled provider, cheapest first.
    /// Backs resolution priority 3 ("model id that matches some enabled
    /// provider's catalog").
    pub async fn find_model_by_id(&self, model_id: &str) -> Result<Option<ModelConfig>, StoreError> {
        let model_id = model_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare(
                "SELECT m.id, m.provider_id, m.model_id, m.display_name, m.tier, m.input_cost_per_million,
                    m.output_cost_per_million, m.max_context_tokens, m.streaming, m.tools, m.vision, m.enabled
                 FROM models m
                 JOIN providers p ON p.provider_id = m.provider_id
                 WHERE m.model_id = ?1 AND m.enabled = 1 AND p.enabled = 1
                 ORDER BY m.input_cost_per_million ASC LIMIT 1",
            )?;
            let mut rows = stmt.query_map(params![model_id], row_to_model)?;
            rows.next().transpose().map_err(StoreError::from)
        })
    }

    pub async fn upsert_budget(&self, budget: &BudgetConfig) -> Result<(), StoreError> {
        let budget = budget.clone();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO budgets (period, limit_usd, enabled, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(period) DO UPDATE SET
                    limit_usd = excluded.limit_usd,
                    enabled = excluded.enabled,
                    updated_at = excluded.updated_at",
                params![
                    period_str(budget.period),
                    budget.limit_usd,
                    budget.enabled,
                    budget.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub async fn get_budget(&self, period: BudgetPeriod) -> Result<Option<BudgetConfig>, StoreError> {
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let row = conn
                .query_row(
                    "SELECT period, limit_usd, enabled, updated_at FROM budgets WHERE period = ?1",
                    params![period_str(period)],
                    |row| {
                        let period_str: String = row.get(0)?;
                        let updated_at: String = row.get(3)?;
                        Ok((period_str, row.get::<_, f64>(1)?, row.get::<_, bool>(2)?, updated_at))
                    },
                )
                .optional()?;
            Ok(row.map(|(period_str, limit_usd, enabled, updated_at)| BudgetConfig {
                period: parse_period(&period_str),
                limit_usd,
                enabled,
                updated_at: parse_ts(&updated_at),
            }))
        })
    }
}

fn period_str(period: BudgetPeriod) -> &'static str {
    match period {
        BudgetPeriod::Daily => "daily",
        BudgetPeriod::Weekly => "weekly",
        BudgetPeriod::Monthly => "monthly",
    }
}

fn parse_period(s: &str) -> BudgetPeriod {
    match s {
        "weekly" => BudgetPeriod::Weekly,
        "monthly" => BudgetPeriod::Monthly,
        _ => BudgetPeriod::Daily,
    }
}

fn row_to_model(row: &rusqlite::Row) -> rusqlite::Result<ModelConfig> {
    let tier_str: String = row.get(4)?;
    Ok(ModelConfig {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        model_id: row.get(2)?,
        display_name: row.get(3)?,
        tier: Tier::from_str(&tier_str).unwrap_or(Tier::Standard),
        input_cost_per_million: row.get(5)?,
        output_cost_per_million: row.get(6)?,
        max_context_tokens: row.get(7)?,
        capabilities: Capabilities {
            streaming: row.get(8)?,
            tools: row.get(9)?,
            vision: row.get(10)?,
        },
        enabled: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str) -> ProviderConfig {
        ProviderConfig {
            provider_id: id.into(),
            display_name: id.into(),
            enabled: true,
            priority: 0,
            config: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn model(provider_id: &str, tier: Tier) -> ModelConfig {
        ModelConfig {
            id: 0,
            provider_id: provider_id.into(),
            model_id: "gpt-4o-mini".into(),
            display_name: "GPT-4o mini".into(),
            tier,
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

    #[tokio::test]
    async fn upsert_and_list_providers_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_provider(&provider("openai")).await.unwrap();
        let all = store.list_providers().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].provider_id, "openai");
    }

    #[tokio::test]
    async fn models_for_tier_filters_by_tier_and_enabled_provider() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_provider(&provider("openai")).await.unwrap();
        store
            .upsert_model(&model("openai", Tier::Economy))
            .await
            .unwrap();

        let economy = store.models_for_tier(Tier::Economy).await.unwrap();
        assert_eq!(economy.len(), 1);
        let premium = store.models_for_tier(Tier::Premium).await.unwrap();
        assert!(premium.is_empty());
    }

    #[tokio::test]
    async fn find_model_matches_exact_provider_and_model() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_provider(&provider("openai")).await.unwrap();
        store.upsert_model(&model("openai", Tier::Economy)).await.unwrap();

        let found = store.find_model("openai", "gpt-4o-mini").await.unwrap();
        assert!(found.is_some());
        assert!(store.find_model("anthropic", "gpt-4o-mini").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_model_by_id_ignores_disabled_providers() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_provider(&provider("openai")).await.unwrap();
        store.upsert_model(&model("openai", Tier::Economy)).await.unwrap();

        let mut disabled = provider("anthropic");
        disabled.enabled = false;
        store.upsert_provider(&disabled).await.unwrap();
        store.upsert_model(&model("anthropic", Tier::Economy)).await.unwrap();

        let found = store.find_model_by_id("gpt-4o-mini").await.unwrap().unwrap();
        assert_eq!(found.provider_id, "openai");
    }

    #[tokio::test]
    async fn budget_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_budget(&BudgetConfig {
                period: BudgetPeriod::Daily,
                limit_usd: 10.0,
                enabled: true,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        let fetched = store.get_budget(BudgetPeriod::Daily).await.unwrap().unwrap();
        assert_eq!(fetched.limit_usd, 10.0);
        assert!(store
            .get_budget(BudgetPeriod::Weekly)
            .await
            .unwrap()
            .is_none());
    }
}
