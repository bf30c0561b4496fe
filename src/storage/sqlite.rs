//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{CommentRecord, RunRecord, RunStatus, RunTotals, UpsertOutcome};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, subject_id, status,
     pages_fetched, comments_visited, comments_inserted, comments_updated, comments_failed";

const COMMENT_COLUMNS: &str =
    "id, root, parent, date, like_count, message, user_id, user_name, user_level";

/// Root and parent are deliberately absent from the update list
const UPSERT_COMMENT_SQL: &str = "
    INSERT INTO comments (id, root, parent, date, like_count, message, user_id, user_name, user_level)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(id) DO UPDATE SET
        date = excluded.date,
        like_count = excluded.like_count,
        message = excluded.message,
        user_id = excluded.user_id,
        user_name = excluded.user_name,
        user_level = excluded.user_level";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        subject_id: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
        totals: RunTotals {
            pages_fetched: row.get(6)?,
            visited: row.get(7)?,
            inserted: row.get(8)?,
            updated: row.get(9)?,
            failed: row.get(10)?,
        },
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        root: row.get(1)?,
        parent: row.get(2)?,
        date: row.get(3)?,
        like_count: row.get(4)?,
        message: row.get(5)?,
        user_id: row.get(6)?,
        user_name: row.get(7)?,
        user_level: row.get(8)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, subject_id: u64) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, subject_id, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, subject_id, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_fetched = ?3,
             comments_visited = ?4, comments_inserted = ?5, comments_updated = ?6,
             comments_failed = ?7 WHERE id = ?8",
            params![
                status.to_db_string(),
                now,
                totals.pages_fetched,
                totals.visited,
                totals.inserted,
                totals.updated,
                totals.failed,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Comment Management =====

    fn upsert_comment(&mut self, record: &CommentRecord) -> StorageResult<UpsertOutcome> {
        let tx = self.conn.transaction()?;

        let existing: Option<u64> = tx
            .query_row(
                "SELECT id FROM comments WHERE id = ?1",
                params![record.id],
                |row| row.get(0),
            )
            .optional()?;

        tx.execute(
            UPSERT_COMMENT_SQL,
            params![
                record.id,
                record.root,
                record.parent,
                record.date,
                record.like_count,
                record.message,
                record.user_id,
                record.user_name,
                record.user_level
            ],
        )?;
        tx.commit()?;

        Ok(match existing {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        })
    }

    fn get_comment(&self, id: u64) -> StorageResult<Option<CommentRecord>> {
        let sql = format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS);
        let comment = self
            .conn
            .query_row(&sql, params![id], comment_from_row)
            .optional()?;
        Ok(comment)
    }

    fn list_comments(&self) -> StorageResult<Vec<CommentRecord>> {
        let sql = format!("SELECT {} FROM comments ORDER BY id", COMMENT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;

        let comments = stmt
            .query_map([], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(comments)
    }

    // ===== Statistics =====

    fn count_comments(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_top_level(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE parent = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_authors(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT user_id) FROM comments", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }
}
