//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

// Timestamps are fixed-width UTC strings (YYYY-MM-DDTHH:MM:SS.mmmZ):
// lexical order is chronological and substr(x, 1, 10) is the calendar date.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS vins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE CHECK (length(code) = 17),
    -- When the VIN was captured (client supplied)
    date_created TEXT NOT NULL,
    user_agent TEXT,
    ip_address TEXT,
    -- When the row was inserted
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_vins_created_at ON vins(created_at);
CREATE INDEX IF NOT EXISTS idx_vins_date_created ON vins(date_created);
"#;
