//! Per-run state shared by the page loop and the writer pool

use crate::config::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop flag for one run
///
/// Cloning shares the flag. Once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a run needs that used to live in process globals
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Seed for the rate limiter's RNG
    pub seed: u64,

    /// Number of concurrent storage writers
    pub workers: usize,

    /// Raise `cancel` and `discard` on the first storage failure
    pub fail_fast: bool,

    /// Stops the page loop; queued writes still drain
    pub cancel: CancelSignal,

    /// Makes writers drop whatever is still queued
    pub discard: CancelSignal,
}

impl RunContext {
    pub fn new(seed: u64, workers: usize, fail_fast: bool) -> Self {
        Self {
            seed,
            workers: workers.max(1),
            fail_fast,
            cancel: CancelSignal::new(),
            discard: CancelSignal::new(),
        }
    }

    /// Builds a context from configuration, drawing a seed when none is set
    pub fn from_config(config: &Config) -> Self {
        let seed = config.rate_limit.seed.unwrap_or_else(rand::random);
        Self::new(seed, config.dispatch.workers, config.dispatch.fail_fast)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops the page loop and drops queued writes
    pub fn abandon(&self) {
        self.discard.cancel();
        self.cancel.cancel();
    }
}
