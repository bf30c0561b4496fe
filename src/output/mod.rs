//! Output module for run reports and database statistics
//!
//! This module handles:
//! - Summarizing a finished run
//! - Reading aggregate counts back out of storage

pub mod stats;

pub use stats::{load_statistics, print_report, print_statistics, CommentStatistics};
