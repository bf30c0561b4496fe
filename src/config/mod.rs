//! Configuration module for Reply-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use reply_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Writers: {}", config.dispatch.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DispatchConfig, OutputConfig, RateLimitConfig, SourceConfig, UnboundedPolicy,
    UserAgentConfig, DEFAULT_ENDPOINT_TEMPLATE, DEFAULT_UPPER_BOUND, DEFAULT_VIEW_ENDPOINT,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, hash_content, load_config, load_config_with_hash, parse_config,
};
pub use validation::check_delay;
