//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{CommentRecord, RunRecord, RunStatus, RunTotals, UpsertOutcome};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Writers share one backend behind a mutex, so implementations must be
/// `Send` but need not be `Sync`.
pub trait Storage: Send {
    // ===== Run Management =====

    /// Creates a new ingestion run and returns its id
    fn create_run(&mut self, config_hash: &str, subject_id: u64) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Stamps the finish time, final status and totals of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus, totals: &RunTotals)
        -> StorageResult<()>;

    // ===== Comment Management =====

    /// Inserts the record if its id is unknown, otherwise refreshes it
    ///
    /// The existence check and the write happen atomically. On update only
    /// the mutable fields change; `root` and `parent` keep the values from
    /// the first insert.
    fn upsert_comment(&mut self, record: &CommentRecord) -> StorageResult<UpsertOutcome>;

    /// Gets a comment by id, with the message exactly as stored
    fn get_comment(&self, id: u64) -> StorageResult<Option<CommentRecord>>;

    /// Gets every stored comment ordered by id
    fn list_comments(&self) -> StorageResult<Vec<CommentRecord>>;

    // ===== Statistics =====

    /// Gets total comment count
    fn count_comments(&self) -> StorageResult<u64>;

    /// Counts comments with `parent = 0`
    fn count_top_level(&self) -> StorageResult<u64>;

    /// Counts distinct authors
    fn count_authors(&self) -> StorageResult<u64>;
}
