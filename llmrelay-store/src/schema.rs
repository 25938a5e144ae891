//! Schema bootstrap. `PRAGMA user_version` is bumped whenever a table shape
//! changes; there is exactly one version today, so the migration runner is
//! "create if missing" rather than a stepped migration chain.

pub const SCHEMA_VERSION: i32 = 2;

pub fn init(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS providers (
            provider_id  TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            enabled      INTEGER NOT NULL DEFAULT 1,
            priority     INTEGER NOT NULL DEFAULT 0,
            config       TEXT NOT NULL DEFAULT '{}',
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS models (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            provider_id             TEXT NOT NULL REFERENCES providers(provider_id),
            model_id                TEXT NOT NULL,
            display_name            TEXT NOT NULL,
            tier                    TEXT NOT NULL,
            input_cost_per_million  REAL NOT NULL,
            output_cost_per_million REAL NOT NULL,
            max_context_tokens      INTEGER NOT NULL,
            streaming               INTEGER NOT NULL DEFAULT 0,
            tools                   INTEGER NOT NULL DEFAULT 0,
            vision                  INTEGER NOT NULL DEFAULT 0,
            enabled                 INTEGER NOT NULL DEFAULT 1,
            UNIQUE(provider_id, model_id)
        );

        CREATE TABLE IF NOT EXISTS budgets (
            period      TEXT PRIMARY KEY,
            limit_usd   REAL NOT NULL,
            enabled     INTEGER NOT NULL DEFAULT 1,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS requests (
            id               TEXT PRIMARY KEY,
            created_at       TEXT NOT NULL,
            category         TEXT,
            complexity_score INTEGER,
            tier             TEXT NOT NULL,
            provider_id      TEXT,
            model_id         TEXT,
            tokens_in        INTEGER NOT NULL DEFAULT 0,
            tokens_out       INTEGER NOT NULL DEFAULT 0,
            cost_usd         REAL NOT NULL DEFAULT 0.0,
            latency_ms       INTEGER,
            cache_hit        INTEGER NOT NULL DEFAULT 0,
            compressed_bytes_saved INTEGER NOT NULL DEFAULT 0,
            success          INTEGER,
            error_message    TEXT,
            feedback_score   INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_requests_created_at ON requests(created_at);
        CREATE INDEX IF NOT EXISTS idx_requests_tier_model ON requests(tier, provider_id, model_id);

        CREATE TABLE IF NOT EXISTS steps (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id  TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            step        TEXT NOT NULL,
            status      TEXT NOT NULL,
            duration_ms INTEGER,
            detail      TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_steps_request_id ON steps(request_id);
        "#,
    )?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
