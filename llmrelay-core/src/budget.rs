//! Budget guard: checks accumulated spend against the configured period
//! limit before dispatch, per §4.6. Any internal failure (missing budget
//! row, store error) fails open — the request proceeds unthrottled rather
//! than blocking on a broken accounting path.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use llmrelay_catalog::{BudgetPeriod, BudgetVerdict};
use llmrelay_store::Store;

/// Guard decision handed back to the pipeline: whether to proceed, and
/// whether the model pick should be downgraded one notch first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetGuardDecision {
    Proceed,
    ProceedDowngraded,
    Deny,
}

fn period_start(period: BudgetPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        BudgetPeriod::Daily => Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
            .single()
            .unwrap_or(now),
        BudgetPeriod::Weekly => {
            let days_since_monday = now.weekday().num_days_from_monday() as i64;
            let midnight_today = Utc
                .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
                .single()
                .unwrap_or(now);
            midnight_today - Duration::days(days_since_monday)
        }
        BudgetPeriod::Monthly => Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now),
    }
}

/// Evaluates every enabled budget row against its own spend window and
/// returns the strictest decision across all of them: `Deny` wins over
/// `ProceedDowngraded`, which wins over `Proceed`.
pub async fn check(store: &Store, now: DateTime<Utc>) -> BudgetGuardDecision {
    let periods = [BudgetPeriod::Daily, BudgetPeriod::Weekly, BudgetPeriod::Monthly];
    let mut decision = BudgetGuardDecision::Proceed;

    for period in periods {
        let budget = match store.get_budget(period).await {
            Ok(Some(b)) if b.enabled => b,
            Ok(_) => continue,
            Err(_) => continue,
        };
        let spend = match store.spend_since(period_start(period, now)).await {
            Ok(s) => s,
            Err(_) => continue,
        };
        decision = combine(decision, verdict_to_decision(budget.evaluate(spend)));
    }

    decision
}

fn verdict_to_decision(verdict: BudgetVerdict) -> BudgetGuardDecision {
    match verdict {
        BudgetVerdict::Allow { .. } => BudgetGuardDecision::Proceed,
        BudgetVerdict::AllowDowngrade { .. } => BudgetGuardDecision::ProceedDowngraded,
        BudgetVerdict::Deny => BudgetGuardDecision::Deny,
    }
}

fn combine(a: BudgetGuardDecision, b: BudgetGuardDecision) -> BudgetGuardDecision {
    use BudgetGuardDecision::*;
    match (a, b) {
        (Deny, _) | (_, Deny) => Deny,
        (ProceedDowngraded, _) | (_, ProceedDowngraded) => ProceedDowngraded,
        _ => Proceed,
    }
}

/// One-notch model downgrade applied when any budget is in its warning
/// band: opus -> sonnet, sonnet -> haiku, anything else is left alone.
pub fn downgrade_model_id(model_id: &str) -> &str {
    match model_id {
        "claude-3-opus" | "opus" => "claude-3-5-sonnet",
        "claude-3-5-sonnet" | "sonnet" => "claude-3-5-haiku",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use llmrelay_catalog::ProviderConfig;
    use llmrelay_store::Store;

    fn budget(period: BudgetPeriod, limit: f64) -> llmrelay_catalog::BudgetConfig {
        llmrelay_catalog::BudgetConfig {
            period,
            limit_usd: limit,
            enabled: true,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn monthly_period_start_is_the_first_of_the_month() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 14, 30, 0).unwrap();
        let start = period_start(BudgetPeriod::Monthly, now);
        assert_eq!(start.day(), 1);
        assert_eq!(start.hour(), 0);
    }

    #[test]
    fn weekly_period_start_is_monday_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 3, 19, 9, 0, 0).unwrap(); // Thursday
        let start = period_start(BudgetPeriod::Weekly, now);
        assert_eq!(start.weekday(), chrono::Weekday::Mon);
        assert_eq!(start.hour(), 0);
    }

    #[test]
    fn downgrade_steps_through_claude_tiers() {
        assert_eq!(downgrade_model_id("claude-3-opus"), "claude-3-5-sonnet");
        assert_eq!(downgrade_model_id("claude-3-5-sonnet"), "claude-3-5-haiku");
        assert_eq!(downgrade_model_id("claude-3-5-haiku"), "claude-3-5-haiku");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_budget_rows_means_proceed() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(check(&store, Utc::now()).await, BudgetGuardDecision::Proceed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exhausted_daily_budget_denies() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_budget(&budget(BudgetPeriod::Daily, 0.01)).await.unwrap();
        store
            .upsert_provider(&ProviderConfig {
                provider_id: "openai".into(),
                display_name: "OpenAI".into(),
                enabled: true,
                priority: 0,
                config: serde_json::json!({}),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .insert_request(&llmrelay_store::RequestRecord {
                id: "req-1".into(),
                created_at: Utc::now(),
                category: None,
                complexity_score: None,
                tier: "economy".into(),
                provider_id: Some("openai".into()),
                model_id: Some("gpt-4o-mini".into()),
                tokens_in: 10,
                tokens_out: 10,
                cost_usd: 0.02,
                latency_ms: None,
                cache_hit: false,
                compressed_bytes_saved: 0,
                success: Some(true),
                error_message: None,
                feedback_score: None,
            })
            .await
            .unwrap();
        assert_eq!(check(&store, Utc::now()).await, BudgetGuardDecision::Deny);
    }
}
