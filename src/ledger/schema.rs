//! Ledger schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::LedgerError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the ledger schema
pub fn init_schema(conn: &Connection) -> Result<(), LedgerError> {
    match get_schema_version(conn)? {
        None => {
            info!("Creating new ledger schema v{}", SCHEMA_VERSION);
            conn.execute_batch(LEDGER_SCHEMA)?;
            set_schema_version(conn, SCHEMA_VERSION)?;
        }
        Some(version) if version == SCHEMA_VERSION => {
            info!("Ledger schema is up to date (v{})", version);
        }
        Some(version) => {
            return Err(LedgerError::Internal(format!(
                "Unsupported ledger schema v{} (expected v{})",
                version, SCHEMA_VERSION
            )));
        }
    }

    Ok(())
}

/// Stored schema version, `None` for a fresh database
fn get_schema_version(conn: &Connection) -> Result<Option<i32>, LedgerError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), LedgerError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

const LEDGER_SCHEMA: &str = r#"
-- Registered participants; seq gives the stable registration order
CREATE TABLE IF NOT EXISTS participants (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    age INTEGER CHECK (age IS NULL OR (age >= 1 AND age <= 120)),
    channel TEXT NOT NULL,
    points INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
    last_long_submission_at TEXT,
    last_activity_at TEXT,
    registered_at TEXT NOT NULL
);

-- Append-only submission log
CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES participants(user_id),
    kind TEXT NOT NULL CHECK (kind IN ('short', 'long')),
    points_earned INTEGER NOT NULL CHECK (points_earned >= 0),
    sent_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_submissions_user_sent ON submissions(user_id, sent_at);
CREATE INDEX IF NOT EXISTS idx_submissions_sent ON submissions(sent_at);
CREATE INDEX IF NOT EXISTS idx_participants_points ON participants(points DESC, seq);
"#;
