//! Randomized request pacing
//!
//! Every remote call is preceded by a sleep drawn uniformly from
//! `[average - range, average + range)` milliseconds.

use crate::config::check_delay;
use crate::ConfigError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Draws a delay without sleeping
///
/// # Returns
///
/// * `Ok(Duration)` - A delay in `[average - range, average + range)`, or
///   exactly `average` when `range` is zero
/// * `Err(ConfigError::DelayRange)` - `range` is larger than `average`
pub fn draw_delay<R: Rng>(rng: &mut R, average: u64, range: u64) -> Result<Duration, ConfigError> {
    check_delay(average, range)?;

    let millis = if range == 0 {
        average
    } else {
        rng.gen_range(average - range..average + range)
    };

    Ok(Duration::from_millis(millis))
}

/// Sleeps for a randomized delay
///
/// Fails before sleeping when `range > average`.
pub async fn delay<R: Rng>(rng: &mut R, average: u64, range: u64) -> Result<Duration, ConfigError> {
    let pause = draw_delay(rng, average, range)?;
    tokio::time::sleep(pause).await;
    Ok(pause)
}

/// Gate in front of every page request of one run
#[derive(Debug)]
pub struct RateLimiter {
    average: u64,
    range: u64,
    rng: StdRng,
    waits: u64,
}

impl RateLimiter {
    /// Creates a limiter with its own seeded RNG
    ///
    /// # Returns
    ///
    /// * `Err(ConfigError::DelayRange)` - `range` is larger than `average`
    /// * `Err(ConfigError::Validation)` - `average + range` overflows
    pub fn new(average: u64, range: u64, seed: u64) -> Result<Self, ConfigError> {
        check_delay(average, range)?;

        Ok(Self {
            average,
            range,
            rng: StdRng::seed_from_u64(seed),
            waits: 0,
        })
    }

    /// Limiter that never sleeps
    pub fn unthrottled() -> Self {
        Self {
            average: 0,
            range: 0,
            rng: StdRng::seed_from_u64(0),
            waits: 0,
        }
    }

    /// Draws the next delay from this limiter's RNG
    pub fn next_delay(&mut self) -> Result<Duration, ConfigError> {
        draw_delay(&mut self.rng, self.average, self.range)
    }

    /// Sleeps before the next request
    pub async fn wait(&mut self) -> Result<(), ConfigError> {
        self.waits += 1;
        let pause = delay(&mut self.rng, self.average, self.range).await?;
        tracing::trace!("Rate limiter slept for {:?}", pause);
        Ok(())
    }

    /// Number of times `wait` has been called
    pub fn waits(&self) -> u64 {
        self.waits
    }
}
