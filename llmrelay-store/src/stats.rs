//! Success-rate aggregation for the router's tier-based model selection.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::Store;

/// Rolling success stats for one `(provider_id, model_id)` pair within a tier
/// and category, used by the router to weigh exploitation against
/// exploration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStats {
    pub provider_id: String,
    pub model_id: String,
    pub total_requests: u32,
    pub successful_requests: u32,
    pub avg_latency_ms: Option<f64>,
}

impl ModelStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }
}

impl Store {
    /// Aggregates requests per `(provider_id, model_id)` within a tier and
    /// category, bounded to `since`. Scoping by category keeps a model's
    /// debugging track record from diluting its code-review one; bounding by
    /// time means a long-dead incident can't permanently suppress a model.
    pub async fn model_stats_for_tier(
        &self,
        tier: &str,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ModelStats>, StoreError> {
        let tier = tier.to_string();
        let category = category.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare(
                "SELECT provider_id, model_id,
                        COUNT(*) as total,
                        SUM(CASE WHEN success = 1 THEN 1 ELSE 0 END) as succeeded,
                        AVG(latency_ms) as avg_latency
                 FROM requests
                 WHERE tier = ?1 AND category = ?2 AND created_at >= ?3
                       AND provider_id IS NOT NULL AND model_id IS NOT NULL
                 GROUP BY provider_id, model_id",
            )?;
            let rows = stmt.query_map(params![tier, category, since.to_rfc3339()], |row| {
                Ok(ModelStats {
                    provider_id: row.get(0)?,
                    model_id: row.get(1)?,
                    total_requests: row.get(2)?,
                    successful_requests: row.get::<_, i64>(3)? as u32,
                    avg_latency_ms: row.get(4)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::RequestRecord;
    use chrono::Utc;

    fn record(provider: &str, model: &str, category: &str, success: bool) -> RequestRecord {
        RequestRecord {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            category: Some(category.into()),
            complexity_score: None,
            tier: "standard".into(),
            provider_id: Some(provider.into()),
            model_id: Some(model.into()),
            tokens_in: 10,
            tokens_out: 10,
            cost_usd: 0.001,
            latency_ms: Some(200),
            cache_hit: false,
            compressed_bytes_saved: 0,
            success: Some(success),
            error_message: None,
            feedback_score: None,
        }
    }

    #[tokio::test]
    async fn aggregates_success_rate_per_model_and_category() {
        let store = Store::open_in_memory().unwrap();
        store.insert_request(&record("openai", "gpt-4o-mini", "code_gen", true)).await.unwrap();
        store.insert_request(&record("openai", "gpt-4o-mini", "code_gen", true)).await.unwrap();
        store.insert_request(&record("openai", "gpt-4o-mini", "code_gen", false)).await.unwrap();
        store.insert_request(&record("openai", "gpt-4o-mini", "simple_qa", true)).await.unwrap();

        let since = Utc::now() - chrono::Duration::days(7);
        let stats = store.model_stats_for_tier("standard", "code_gen", since).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_requests, 3);
        assert!((stats[0].success_rate() - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn excludes_requests_outside_the_window() {
        let store = Store::open_in_memory().unwrap();
        let mut stale = record("openai", "gpt-4o-mini", "code_gen", true);
        stale.created_at = Utc::now() - chrono::Duration::days(30);
        store.insert_request(&stale).await.unwrap();

        let since = Utc::now() - chrono::Duration::days(7);
        let stats = store.model_stats_for_tier("standard", "code_gen", since).await.unwrap();
        assert!(stats.is_empty());
    }
}
