//! Per-request step log: one row per pipeline stage entry/exit (§4.1),
//! append-only, feeding per-request timing breakdowns for the dashboard.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Started,
    Completed,
    Error,
    Skipped,
}

impl StepStatus {
    fn as_str(self) -> &'static str {
        match self {
            StepStatus::Started => "started",
            StepStatus::Completed => "completed",
            StepStatus::Error => "error",
            StepStatus::Skipped => "skipped",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "started" => StepStatus::Started,
            "error" => StepStatus::Error,
            "skipped" => StepStatus::Skipped,
            _ => StepStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: i64,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
    pub step: String,
    pub status: StepStatus,
    pub duration_ms: Option<u64>,
    pub detail: Option<String>,
}

impl Store {
    /// Appends one step record. Never fails the caller's pipeline stage on
    /// error, the same fire-and-forget contract as `insert_request`.
    pub async fn insert_step(
        &self,
        request_id: &str,
        step: &str,
        status: StepStatus,
        duration_ms: Option<u64>,
        detail: Option<String>,
    ) -> Result<(), StoreError> {
        let request_id = request_id.to_string();
        let step = step.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO steps (request_id, created_at, step, status, duration_ms, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![request_id, Utc::now().to_rfc3339(), step, status.as_str(), duration_ms, detail],
            )?;
            Ok(())
        })
    }

    /// All step records for one request, oldest first (the order they ran in).
    pub async fn steps_for_request(&self, request_id: &str) -> Result<Vec<StepRecord>, StoreError> {
        let request_id = request_id.to_string();
        let db = self.db.clone();
        tokio::task::block_in_place(move || {
            let conn = db.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = conn.prepare(
                "SELECT id, request_id, created_at, step, status, duration_ms, detail
                 FROM steps WHERE request_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![request_id], row_to_step)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
        })
    }
}

fn row_to_step(row: &rusqlite::Row) -> rusqlite::Result<StepRecord> {
    let created_at: String = row.get(2)?;
    let status: String = row.get(4)?;
    Ok(StepRecord {
        id: row.get(0)?,
        request_id: row.get(1)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        step: row.get(3)?,
        status: StepStatus::parse(&status),
        duration_ms: row.get(5)?,
        detail: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn steps_round_trip_in_order() {
        let store = Store::open_in_memory().unwrap();
        store.insert_step("req-1", "parse", StepStatus::Completed, Some(1), None).await.unwrap();
        store.insert_step("req-1", "classify", StepStatus::Completed, Some(3), None).await.unwrap();
        store.insert_step("req-2", "parse", StepStatus::Completed, Some(1), None).await.unwrap();

        let steps = store.steps_for_request("req-1").await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step, "parse");
        assert_eq!(steps[1].step, "classify");
    }

    #[tokio::test]
    async fn step_without_a_request_row_still_inserts() {
        // No FK enforcement: a step can reference a request id that hasn't
        // been written (or never will be, e.g. a feedback short-circuit).
        let store = Store::open_in_memory().unwrap();
        store.insert_step("req-ghost", "feedback", StepStatus::Skipped, None, None).await.unwrap();
        let steps = store.steps_for_request("req-ghost").await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].status, StepStatus::Skipped);
    }
}
