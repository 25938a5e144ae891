//! Integration tests for llmrelay_store::Store against an on-disk database.
//! Uses multi_thread runtime so Store's block_in_place is allowed.

use chrono::Utc;
use llmrelay_catalog::{BudgetConfig, BudgetPeriod, Capabilities, ModelConfig, ProviderConfig, Tier};
use llmrelay_store::{RequestRecord, Store};
use tempfile::NamedTempFile;

fn provider(id: &str) -> ProviderConfig {
    ProviderConfig {
        provider_id: id.into(),
        display_name: id.into(),
        enabled: true,
        priority: 0,
        config: serde_json::json!({"api_key": "test-key"}),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn model(provider_id: &str) -> ModelConfig {
    ModelConfig {
        id: 0,
        provider_id: provider_id.into(),
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

#[tokio::test(flavor = "multi_thread")]
async fn reopening_same_path_preserves_catalog_and_requests() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_path_buf();

    {
        let store = Store::open(&path).unwrap();
        store.upsert_provider(&provider("openai")).await.unwrap();
        store.upsert_model(&model("openai")).await.unwrap();
        store
            .upsert_budget(&BudgetConfig {
                period: BudgetPeriod::Daily,
                limit_usd: 5.0,
                enabled: true,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .insert_request(&RequestRecord {
                id: "req-1".into(),
                created_at: Utc::now(),
                category: Some("general".into()),
                complexity_score: Some(10),
                tier: "economy".into(),
                provider_id: Some("openai".into()),
                model_id: Some("gpt-4o-mini".into()),
                tokens_in: 50,
                tokens_out: 20,
                cost_usd: 0.005,
                latency_ms: Some(120),
                cache_hit: false,
                compressed_bytes_saved: 0,
                success: Some(true),
                error_message: None,
                feedback_score: None,
            })
            .await
            .unwrap();
    }

    let store = Store::open(&path).unwrap();
    let providers = store.list_providers().await.unwrap();
    assert_eq!(providers.len(), 1);

    let economy_models = store.models_for_tier(Tier::Economy).await.unwrap();
    assert_eq!(economy_models.len(), 1);

    let budget = store.get_budget(BudgetPeriod::Daily).await.unwrap().unwrap();
    assert_eq!(budget.limit_usd, 5.0);

    let recent = store.recent_requests(10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, "req-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn disabling_provider_excludes_its_models_from_tier_lookup() {
    let file = NamedTempFile::new().unwrap();
    let store = Store::open(file.path()).unwrap();

    let mut disabled = provider("anthropic");
    disabled.enabled = false;
    store.upsert_provider(&disabled).await.unwrap();
    store.upsert_model(&model("anthropic")).await.unwrap();

    let economy_models = store.models_for_tier(Tier::Economy).await.unwrap();
    assert!(economy_models.is_empty());
}
