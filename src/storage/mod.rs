//! Storage module for persisting harvested comments
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Atomic comment upserts keyed by comment id
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::codec;
use crate::model::Comment;
use crate::HarvestError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Durable projection of a comment, keyed by `id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub id: u64,
    pub root: u64,
    pub parent: u64,
    pub date: String,
    pub like_count: u64,
    /// Codec-encoded message text
    pub message: String,
    pub user_id: u64,
    pub user_name: String,
    pub user_level: i32,
}

impl CommentRecord {
    /// Projects a single comment node; replies are not included
    pub fn from_comment(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            root: comment.root,
            parent: comment.parent,
            date: comment.time.clone(),
            like_count: comment.like,
            message: codec::encode(&comment.message),
            user_id: comment.user_id,
            user_name: comment.user_name.clone(),
            user_level: comment.user_level,
        }
    }
}

/// What an upsert did to the comments table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Represents an ingestion run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub subject_id: u64,
    pub status: RunStatus,
    pub totals: RunTotals,
}

/// Counters recorded on a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub pages_fetched: u64,
    pub visited: u64,
    pub inserted: u64,
    pub updated: u64,
    pub failed: u64,
}

/// Status of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Stopped on purpose: boundary not found, cancellation, or fail-fast
    Aborted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
