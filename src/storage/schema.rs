//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the Reply-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track ingestion runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    subject_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    pages_fetched INTEGER NOT NULL DEFAULT 0,
    comments_visited INTEGER NOT NULL DEFAULT 0,
    comments_inserted INTEGER NOT NULL DEFAULT 0,
    comments_updated INTEGER NOT NULL DEFAULT 0,
    comments_failed INTEGER NOT NULL DEFAULT 0
);

-- One row per comment id; root and parent are fixed at first sighting
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY,
    root INTEGER NOT NULL,
    parent INTEGER NOT NULL,
    date TEXT NOT NULL,
    like_count INTEGER NOT NULL DEFAULT 0,
    message TEXT NOT NULL,
    user_id INTEGER NOT NULL,
    user_name TEXT NOT NULL,
    user_level INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_comments_root ON comments(root);
CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent);
CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
