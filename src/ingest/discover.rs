//! Page-count discovery
//!
//! Finds the first empty page with a binary search between page 1 and a fixed
//! upper bound, instead of walking every index. Requires the source to be
//! monotonic: once a page is empty, every later page is empty too.

use crate::ingest::fetcher::PageSource;
use crate::ingest::limiter::RateLimiter;
use crate::HarvestError;

/// Outcome of page-count discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    /// Page 1 is already empty; the thread has no data
    Empty,

    /// First empty page; pages `1..boundary` have data
    Boundary(u32),

    /// The upper bound itself still has data, so no boundary was found
    Unbounded,
}

impl PageCount {
    /// Number of data pages, when known
    pub fn data_pages(&self) -> Option<u32> {
        match self {
            PageCount::Empty => Some(0),
            PageCount::Boundary(boundary) => Some(boundary - 1),
            PageCount::Unbounded => None,
        }
    }
}

/// Probes `source` for its boundary page
///
/// Each probe waits on `limiter` first. Page 1 and `upper_bound` are probed
/// up front; the search then keeps `low` on a page with data and `high` on an
/// empty page until they are adjacent, and returns `high`.
///
/// # Arguments
///
/// * `source` - The page source to probe
/// * `limiter` - Pacing applied before every probe
/// * `upper_bound` - Highest index probed; must be at least 2
pub async fn discover_page_count<P: PageSource + ?Sized>(
    source: &P,
    limiter: &mut RateLimiter,
    upper_bound: u32,
) -> Result<PageCount, HarvestError> {
    let upper_bound = upper_bound.max(2);

    if !probe(source, limiter, 1).await? {
        tracing::info!("Page 1 is empty, thread has no data");
        return Ok(PageCount::Empty);
    }

    if probe(source, limiter, upper_bound).await? {
        tracing::warn!(
            "Page {} still has data, no boundary found within the upper bound",
            upper_bound
        );
        return Ok(PageCount::Unbounded);
    }

    let mut low = 1u32;
    let mut high = upper_bound;

    while high - low > 1 {
        let mid = low + (high - low) / 2;
        if probe(source, limiter, mid).await? {
            low = mid;
        } else {
            high = mid;
        }
        tracing::debug!("Boundary search narrowed to ({}, {}]", low, high);
    }

    tracing::info!("First empty page is {}", high);
    Ok(PageCount::Boundary(high))
}

/// Returns whether `page` has data
async fn probe<P: PageSource + ?Sized>(
    source: &P,
    limiter: &mut RateLimiter,
    page: u32,
) -> Result<bool, HarvestError> {
    limiter.wait().await?;
    let has_data = !source.fetch_page(page).await?.is_empty();
    tracing::debug!("Probed page {}: has_data={}", page, has_data);
    Ok(has_data)
}
