//! Reply-Harvest: keeps a local store in sync with a paginated comment thread
//!
//! This crate discovers how many pages a remote discussion has, walks every
//! page's reply tree and upserts each comment into SQLite through a bounded
//! pool of writers.

pub mod codec;
pub mod config;
pub mod ingest;
pub mod model;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Reply-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unexpected status {status} from {url}")]
    Transport { url: String, status: u16 },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Malformed payload from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("Source rejected {url} with code {code}: {message}")]
    Api {
        url: String,
        code: i64,
        message: String,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Writer task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Delay range {range}ms exceeds average delay {average}ms")]
    DelayRange { average: u64, range: u64 },
}

/// Result type alias for Reply-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use codec::{decode, encode};
pub use config::Config;
pub use ingest::{Coordinator, IngestReport, PageCount};
pub use model::{Comment, Page};
