//! Statistics generation from the comment database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::ingest::IngestReport;
use crate::storage::{RunRecord, Storage};
use crate::HarvestError;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct CommentStatistics {
    /// Total number of stored comments
    pub total_comments: u64,

    /// Comments with no parent
    pub top_level: u64,

    /// Number of distinct authors
    pub distinct_authors: u64,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,
}

impl CommentStatistics {
    /// Comments that answer another comment
    pub fn replies(&self) -> u64 {
        self.total_comments.saturating_sub(self.top_level)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CommentStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CommentStatistics, HarvestError> {
    Ok(CommentStatistics {
        total_comments: storage.count_comments()?,
        top_level: storage.count_top_level()?,
        distinct_authors: storage.count_authors()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CommentStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Comments:");
    println!("  Total stored: {}", stats.total_comments);
    println!("  Top-level: {}", stats.top_level);
    println!("  Replies: {}", stats.replies());
    println!("  Distinct authors: {}", stats.distinct_authors);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  Run id: {}", run.id);
            println!("  Subject: {}", run.subject_id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("(not finished)")
            );
            println!("  Pages fetched: {}", run.totals.pages_fetched);
            println!(
                "  Nodes: {} visited, {} inserted, {} updated, {} failed",
                run.totals.visited, run.totals.inserted, run.totals.updated, run.totals.failed
            );
        }
        None => println!("No runs recorded yet."),
    }
}

/// Prints the outcome of a run that just finished
pub fn print_report(report: &IngestReport) {
    let summary = &report.summary;

    println!("=== Run {} ===\n", report.run_id);
    match report.page_count.data_pages() {
        Some(pages) => println!("Data pages discovered: {}", pages),
        None => println!("Data pages discovered: unknown (no boundary found)"),
    }
    println!("Pages fetched: {}", report.pages_fetched);
    println!("Requests: {}", report.requests);
    println!("Status: {}", report.status.to_db_string());
    println!();

    println!("Comments:");
    println!("  Visited: {}", summary.visited);
    println!("  Inserted: {}", summary.inserted);
    println!("  Updated: {}", summary.updated);
    if summary.skipped > 0 {
        println!("  Skipped: {}", summary.skipped);
    }
    println!("  Failed: {}", summary.failed());

    for failure in summary.failures.iter().take(10) {
        println!("    - {}: {}", failure.id, failure.error);
    }
    if summary.failures.len() > 10 {
        println!("    ... and {} more", summary.failures.len() - 10);
    }
}
