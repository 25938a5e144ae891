//! Per-request history: one row logged at the end of every pipeline run,
//! feeding both the activity feed and the router's success statistics.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub category: Option<String>,
    pub complexity_score: Option<u8>,
    pub tier: String,
    pub provider_id: Option<String>,
    pub model_id: Option<String>,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost_usd: f64,
    pub latency_ms: Option<u64>,
    pub cache_hit: bool,
    pub compressed_bytes_saved: u32,
    pub success: Option<bool>,
    pub error_message: Option<String>,
    pub feedback_score: Option<i32>,
}

impl Store {
    pub async fn insert_request(&self, record: &RequestRecord) -> Result<(), StoreError> {
        let record = record.clone();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO requests (id, created_at, category, complexity_score, tier, provider_id,
                    model_id, tokens_in, tokens_out, cost_usd, latency_ms, cache_hit,
                    compressed_bytes_saved, success, error_message, feedback_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    record.id,
                    record.created_at.to_rfc3339(),
                    record.category,
                    record.complexity_score,
                    record.tier,
                    record.provider_id,
                    record.model_id,
                    record.tokens_in,
                    record.tokens_out,
                    record.cost_usd,
                    record.latency_ms,
                    record.cache_hit,
                    record.compressed_bytes_saved,
                    record.success,
                    record.error_message,
                    record.feedback_score,
                ],
            )?;
            Ok(())
        })
    }

    pub async fn set_feedback_score(&self, request_id: &str, score: i32) -> Result<(), StoreError> {
        let request_id = request_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let changed = conn.execute(
                "UPDATE requests SET feedback_score = ?1 WHERE id = ?2",
                params![score, request_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("request {request_id}")));
            }
            Ok(())
        })
    }

    pub async fn get_request(&self, id: &str) -> Result<Option<RequestRecord>, StoreError> {
        let id = id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            conn.query_row(
                "SELECT id, created_at, category, complexity_score, tier, provider_id, model_id,
                    tokens_in, tokens_out, cost_usd, latency_ms, cache_hit, compressed_bytes_saved,
                    success, error_message, feedback_score
                 FROM requests WHERE id = ?1",
                params![id],
                row_to_record,
            )
            .optional()
            .map_err(StoreError::from)
        })
    }

    /// Most recent requests, newest first. Backs the activity feed's initial page.
    pub async fn recent_requests(&self, limit: u32) -> Result<Vec<RequestRecord>, StoreError> {
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare(
                "SELECT id, created_at, category, complexity_score, tier, provider_id, model_id,
                    tokens_in, tokens_out, cost_usd, latency_ms, cache_hit, compressed_bytes_saved,
                    success, error_message, feedback_score
                 FROM requests ORDER BY created_at DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], row_to_record)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    /// Success flags for a model's most recent requests in one category,
    /// newest first. Backs the router's consecutive-failure skip (last 3 all
    /// failed) — scoped by category so a model's code-review track record
    /// doesn't get skipped over a streak of unrelated debugging failures.
    pub async fn recent_outcomes(
        &self,
        provider_id: &str,
        model_id: &str,
        category: &str,
        limit: u32,
    ) -> Result<Vec<bool>, StoreError> {
        let provider_id = provider_id.to_string();
        let model_id = model_id.to_string();
        let category = category.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare(
                "SELECT success FROM requests
                 WHERE provider_id = ?1 AND model_id = ?2 AND category = ?3 AND success IS NOT NULL
                 ORDER BY created_at DESC LIMIT ?4",
            )?;
            let rows = stmt.query_map(params![provider_id, model_id, category, limit], |row| row.get::<_, bool>(0))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }

    /// Total spend since `since` (inclusive), for budget evaluation.
    pub async fn spend_since(&self, since: DateTime<Utc>) -> Result<f64, StoreError> {
        let since = since.to_rfc3339();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let total: f64 = conn.query_row(
                "SELECT COALESCE(SUM(cost_usd), 0.0) FROM requests WHERE created_at >= ?1",
                params![since],
                |row| row.get(0),
            )?;
            Ok(total)
        })
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<RequestRecord> {
    let created_at: String = row.get(1)?;
    Ok(RequestRecord {
        id: row.get(0)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        category: row.get(2)?,
        complexity_score: row.get(3)?,
        tier: row.get(4)?,
        provider_id: row.get(5)?,
        model_id: row.get(6)?,
        tokens_in: row.get(7)?,
        tokens_out: row.get(8)?,
        cost_usd: row.get(9)?,
        latency_ms: row.get(10)?,
        cache_hit: row.get(11)?,
        compressed_bytes_saved: row.get(12)?,
        success: row.get(13)?,
        error_message: row.get(14)?,
        feedback_score: row.get(15)?,
    })
}
