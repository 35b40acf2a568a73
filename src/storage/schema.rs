//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Pagekeep database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track batch runs
CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id TEXT NOT NULL,
    total INTEGER NOT NULL,
    success_count INTEGER NOT NULL DEFAULT 0,
    failed_count INTEGER NOT NULL DEFAULT 0,
    config_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL
);

-- One row per submitted URL
CREATE TABLE IF NOT EXISTS saved_items (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    url TEXT NOT NULL,
    status TEXT NOT NULL,
    title TEXT,
    content TEXT,
    original_image TEXT,
    author TEXT,
    published_at TEXT,
    summary TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    batch_id INTEGER REFERENCES batches(id),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_saved_items_owner ON saved_items(owner_id, created_at);
CREATE INDEX IF NOT EXISTS idx_saved_items_status ON saved_items(status);
CREATE INDEX IF NOT EXISTS idx_saved_items_batch ON saved_items(batch_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
