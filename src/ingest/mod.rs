//! Ingestion pipeline
//!
//! # Components
//!
//! - `limiter`: randomized pacing in front of every request
//! - `fetcher`: the `PageSource` seam and its HTTP implementation
//! - `subject`: turns a configured bvid into the numeric subject id
//! - `discover`: binary search for the first empty page
//! - `dispatcher`: bounded writer pool that persists comment trees
//! - `coordinator`: the page loop tying the above to one recorded run

mod context;
mod coordinator;
mod discover;
mod dispatcher;
mod fetcher;
mod limiter;
mod subject;

pub use context::{CancelSignal, RunContext};
pub use coordinator::{Coordinator, IngestReport};
pub use discover::{discover_page_count, PageCount};
pub use dispatcher::{DispatchSummary, Dispatcher, NodeFailure};
pub use fetcher::{build_http_client, decode_page, HttpPageSource, PageSource};
pub use limiter::{delay, draw_delay, RateLimiter};
pub use subject::{decode_view, resolve_bvid, resolve_subject};
