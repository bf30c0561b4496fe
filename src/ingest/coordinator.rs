//! Ingestion coordinator - main run orchestration logic
//!
//! This module contains the page loop that coordinates one run:
//! - Recording the run in storage
//! - Discovering the first empty page
//! - Fetching pages in order behind the rate limiter
//! - Handing every page's tree to the writer pool
//! - Stamping the final status and totals on the run

use crate::config::{Config, UnboundedPolicy};
use crate::ingest::context::{CancelSignal, RunContext};
use crate::ingest::discover::{discover_page_count, PageCount};
use crate::ingest::dispatcher::{DispatchSummary, Dispatcher};
use crate::ingest::fetcher::{build_http_client, HttpPageSource, PageSource};
use crate::ingest::limiter::RateLimiter;
use crate::ingest::subject::resolve_subject;
use crate::model::Page;
use crate::storage::{open_storage, RunStatus, RunTotals, SqliteStorage, Storage, StorageError};
use crate::{ConfigError, HarvestError};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Result of a finished run
#[derive(Debug)]
pub struct IngestReport {
    pub run_id: i64,
    pub page_count: PageCount,
    pub pages_fetched: u64,
    /// Requests that waited on the rate limiter, discovery included
    pub requests: u64,
    pub summary: DispatchSummary,
    pub status: RunStatus,
}

impl IngestReport {
    pub fn totals(&self) -> RunTotals {
        totals_of(self.pages_fetched, &self.summary)
    }
}

/// Main ingestion coordinator
pub struct Coordinator<P, S> {
    config: Arc<Config>,
    config_hash: String,
    subject_id: u64,
    source: P,
    storage: Arc<Mutex<S>>,
    ctx: RunContext,
}

impl Coordinator<HttpPageSource, SqliteStorage> {
    /// Creates a coordinator that reads over HTTP and writes to the
    /// configured SQLite database
    ///
    /// A `bvid` source is resolved to its numeric subject id here, before
    /// any page is requested.
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration text, stored on the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to open storage, build the client or
    ///   resolve the subject
    pub async fn new(mut config: Config, config_hash: String) -> Result<Self, HarvestError> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        let client = build_http_client(&config.user_agent)?;

        let subject_id = resolve_subject(&client, &config.source).await?;
        config.source.subject_id = Some(subject_id);
        let source = HttpPageSource::new(client, config.source.endpoint_for(subject_id));

        Self::with_parts(config, config_hash, source, storage)
    }
}

impl<P: PageSource, S: Storage + 'static> Coordinator<P, S> {
    /// Creates a coordinator over an arbitrary source and storage backend
    ///
    /// `config.source.subject_id` must already be set.
    pub fn with_parts(
        config: Config,
        config_hash: String,
        source: P,
        storage: S,
    ) -> Result<Self, HarvestError> {
        let subject_id = config.source.subject_id.ok_or_else(|| {
            ConfigError::Validation("subject_id is unresolved".to_string())
        })?;
        let ctx = RunContext::from_config(&config);

        // Reject bad pacing before anything touches the network
        RateLimiter::new(
            config.rate_limit.average_delay,
            config.rate_limit.delay_range,
            ctx.seed,
        )?;

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            subject_id,
            source,
            storage: Arc::new(Mutex::new(storage)),
            ctx,
        })
    }

    /// Signal that stops the run at the next page boundary
    pub fn cancel_signal(&self) -> CancelSignal {
        self.ctx.cancel.clone()
    }

    /// Shared handle to the storage backend
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    fn limiter(&self) -> Result<RateLimiter, HarvestError> {
        Ok(RateLimiter::new(
            self.config.rate_limit.average_delay,
            self.config.rate_limit.delay_range,
            self.ctx.seed,
        )?)
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, S>, HarvestError> {
        self.storage
            .lock()
            .map_err(|_| HarvestError::Storage(StorageError::LockPoisoned))
    }

    /// Runs discovery only; nothing is written
    pub async fn probe(&self) -> Result<PageCount, HarvestError> {
        let mut limiter = self.limiter()?;
        discover_page_count(&self.source, &mut limiter, self.config.source.upper_bound).await
    }

    /// Runs one full ingestion
    ///
    /// 1. Records a new run
    /// 2. Discovers the first empty page
    /// 3. Fetches pages `1..boundary` in order, dispatching each tree
    /// 4. Waits for every write and stamps the run
    ///
    /// A fetch failure drains outstanding writes, marks the run failed and
    /// returns the error.
    pub async fn run(&self) -> Result<IngestReport, HarvestError> {
        let mut limiter = self.limiter()?;
        let subject_id = self.subject_id;
        let run_id = self
            .lock_storage()?
            .create_run(&self.config_hash, subject_id)?;

        tracing::info!("Starting ingestion run {} for subject {}", run_id, subject_id);
        let start_time = Instant::now();

        let page_count =
            match discover_page_count(&self.source, &mut limiter, self.config.source.upper_bound)
                .await
            {
                Ok(count) => count,
                Err(e) => {
                    self.mark_failed(run_id, &RunTotals::default());
                    return Err(e);
                }
            };

        match page_count {
            PageCount::Empty => {
                return self.close(
                    run_id,
                    page_count,
                    0,
                    limiter.waits(),
                    DispatchSummary::default(),
                    RunStatus::Completed,
                );
            }
            PageCount::Unbounded if self.config.source.unbounded == UnboundedPolicy::Abort => {
                tracing::warn!(
                    "No boundary below page {}, aborting run {}",
                    self.config.source.upper_bound,
                    run_id
                );
                return self.close(
                    run_id,
                    page_count,
                    0,
                    limiter.waits(),
                    DispatchSummary::default(),
                    RunStatus::Aborted,
                );
            }
            _ => {}
        }

        let mut dispatcher = Dispatcher::start(Arc::clone(&self.storage), &self.ctx);
        let mut pages_fetched = 0u64;
        let mut page = 1u32;

        loop {
            if self.ctx.is_cancelled() {
                tracing::warn!("Run {} cancelled before page {}", run_id, page);
                break;
            }

            if let PageCount::Boundary(boundary) = page_count {
                if page >= boundary {
                    break;
                }
            }

            let fetched = match limiter.wait().await {
                Ok(()) => self.source.fetch_page(page).await,
                Err(e) => Err(e.into()),
            };
            let comments = match fetched {
                Ok(Page::Replies(comments)) => comments,
                Ok(Page::Empty) => {
                    tracing::info!("Page {} is empty, thread exhausted", page);
                    break;
                }
                Err(e) => {
                    tracing::error!("Fetching page {} failed: {}", page, e);
                    let totals = match dispatcher.finish().await {
                        Ok(summary) => totals_of(pages_fetched, &summary),
                        Err(join) => {
                            tracing::error!("Writers did not drain cleanly: {}", join);
                            RunTotals {
                                pages_fetched,
                                ..RunTotals::default()
                            }
                        }
                    };
                    self.mark_failed(run_id, &totals);
                    return Err(e);
                }
            };

            pages_fetched += 1;
            let queued: usize = comments.into_iter().map(|c| dispatcher.dispatch(c)).sum();

            let elapsed = start_time.elapsed();
            tracing::info!(
                "Progress: page {} queued {} comments, {} total, {:.2} pages/sec",
                page,
                queued,
                dispatcher.enqueued(),
                pages_fetched as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
            );

            page = match page.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }

        let summary = match dispatcher.finish().await {
            Ok(summary) => summary,
            Err(e) => {
                self.mark_failed(
                    run_id,
                    &RunTotals {
                        pages_fetched,
                        ..RunTotals::default()
                    },
                );
                return Err(e);
            }
        };

        let status = if self.ctx.is_cancelled() {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        };

        tracing::info!(
            "Run {} finished in {:?}: {} pages, {} nodes",
            run_id,
            start_time.elapsed(),
            pages_fetched,
            summary.visited
        );

        let requests = limiter.waits();
        self.close(run_id, page_count, pages_fetched, requests, summary, status)
    }

    fn close(
        &self,
        run_id: i64,
        page_count: PageCount,
        pages_fetched: u64,
        requests: u64,
        summary: DispatchSummary,
        status: RunStatus,
    ) -> Result<IngestReport, HarvestError> {
        let totals = totals_of(pages_fetched, &summary);
        self.lock_storage()?.finish_run(run_id, status, &totals)?;

        if !summary.failures.is_empty() {
            tracing::warn!(
                "Run {} had {} failed writes",
                run_id,
                summary.failures.len()
            );
        }

        Ok(IngestReport {
            run_id,
            page_count,
            pages_fetched,
            requests,
            summary,
            status,
        })
    }

    /// Best effort; the original error is what the caller sees
    fn mark_failed(&self, run_id: i64, totals: &RunTotals) {
        let result = self.lock_storage().and_then(|mut storage| {
            storage
                .finish_run(run_id, RunStatus::Failed, totals)
                .map_err(HarvestError::from)
        });
        if let Err(e) = result {
            tracing::error!("Could not mark run {} as failed: {}", run_id, e);
        }
    }
}

fn totals_of(pages_fetched: u64, summary: &DispatchSummary) -> RunTotals {
    RunTotals {
        pages_fetched,
        visited: summary.visited,
        inserted: summary.inserted,
        updated: summary.updated,
        failed: summary.failed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::model::Comment;
    use async_trait::async_trait;

    fn test_config(upper_bound: u32, unbounded: &str) -> Config {
        parse_config(&format!(
            r#"
[source]
subject-id = 7
endpoint = "http://localhost/reply?pn="
upper-bound = {}
unbounded = "{}"

[rate-limit]
average-delay = 0
delay-range = 0
seed = 1

[dispatch]
workers = 3

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"

[output]
database-path = "unused.db"
"#,
            upper_bound, unbounded
        ))
        .unwrap()
    }

    fn leaf(id: u64, root: u64, parent: u64) -> Comment {
        Comment {
            id,
            root,
            parent,
            time: String::new(),
            like: 0,
            message: format!("m{}", id),
            replies: vec![],
            user_id: id,
            user_name: String::new(),
            user_level: 0,
        }
    }

    /// `pages[i]` is page `i + 1`; everything past the end is empty
    struct ScriptedSource {
        pages: Vec<Vec<Comment>>,
        fail_on: Option<u32>,
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch_page(&self, page: u32) -> Result<Page, HarvestError> {
            if self.fail_on == Some(page) {
                return Err(HarvestError::Transport {
                    url: format!("scripted://{}", page),
                    status: 500,
                });
            }
            match self.pages.get(page as usize - 1) {
                Some(comments) => Ok(Page::Replies(comments.clone())),
                None => Ok(Page::Empty),
            }
        }
    }

    fn three_pages() -> Vec<Vec<Comment>> {
        let mut first = leaf(1, 0, 0);
        first.replies = vec![leaf(2, 1, 1)];
        vec![vec![first], vec![leaf(3, 0, 0)], vec![leaf(4, 0, 0), leaf(5, 0, 0)]]
    }

    fn coordinator(
        source: ScriptedSource,
        config: Config,
    ) -> Coordinator<ScriptedSource, SqliteStorage> {
        Coordinator::with_parts(
            config,
            "hash".to_string(),
            source,
            SqliteStorage::new_in_memory().unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_full_run() {
        let source = ScriptedSource {
            pages: three_pages(),
            fail_on: None,
        };
        let coordinator = coordinator(source, test_config(8, "follow"));

        let report = coordinator.run().await.unwrap();
        assert_eq!(report.page_count, PageCount::Boundary(4));
        assert_eq!(report.pages_fetched, 3);
        assert_eq!(report.summary.inserted, 5);
        assert_eq!(report.status, RunStatus::Completed);
        // Five discovery fetches and three page fetches, each paced
        assert_eq!(report.requests, 8);

        let storage = coordinator.storage();
        let storage = storage.lock().unwrap();
        let run = storage.get_run(report.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.totals, report.totals());
        assert_eq!(storage.count_comments().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_empty_thread_completes() {
        let source = ScriptedSource {
            pages: vec![],
            fail_on: None,
        };
        let coordinator = coordinator(source, test_config(8, "follow"));

        let report = coordinator.run().await.unwrap();
        assert_eq!(report.page_count, PageCount::Empty);
        assert_eq!(report.pages_fetched, 0);
        assert_eq!(report.requests, 1);
        assert_eq!(report.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_unbounded_follow_reads_past_bound() {
        let source = ScriptedSource {
            pages: three_pages(),
            fail_on: None,
        };
        let coordinator = coordinator(source, test_config(2, "follow"));

        let report = coordinator.run().await.unwrap();
        assert_eq!(report.page_count, PageCount::Unbounded);
        assert_eq!(report.pages_fetched, 3);
        assert_eq!(report.summary.inserted, 5);
        // Pages 1 and 2 for discovery, then 1 through 4 in the loop
        assert_eq!(report.requests, 6);
    }

    #[tokio::test]
    async fn test_unbounded_abort_skips_fetching() {
        let source = ScriptedSource {
            pages: three_pages(),
            fail_on: None,
        };
        let coordinator = coordinator(source, test_config(2, "abort"));

        let report = coordinator.run().await.unwrap();
        assert_eq!(report.status, RunStatus::Aborted);
        assert_eq!(report.pages_fetched, 0);

        let storage = coordinator.storage();
        assert_eq!(storage.lock().unwrap().count_comments().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_marks_run_failed() {
        let source = ScriptedSource {
            pages: three_pages(),
            fail_on: Some(2),
        };
        // Discovery probes 1, 8, 4, then fails on 2
        let coordinator = coordinator(source, test_config(8, "follow"));

        let result = coordinator.run().await;
        assert!(matches!(
            result,
            Err(HarvestError::Transport { status: 500, .. })
        ));

        let storage = coordinator.storage();
        let storage = storage.lock().unwrap();
        let run = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = ScriptedSource {
            pages: three_pages(),
            fail_on: None,
        };
        let coordinator = coordinator(source, test_config(8, "follow"));
        coordinator.cancel_signal().cancel();

        let report = coordinator.run().await.unwrap();
        assert_eq!(report.status, RunStatus::Aborted);
        assert_eq!(report.pages_fetched, 0);
    }

    #[test]
    fn test_unresolved_subject_is_rejected() {
        let mut config = test_config(8, "follow");
        config.source.subject_id = None;
        config.source.bvid = Some("BV1f4411M7QC".to_string());

        let result = Coordinator::with_parts(
            config,
            "hash".to_string(),
            ScriptedSource {
                pages: vec![],
                fail_on: None,
            },
            SqliteStorage::new_in_memory().unwrap(),
        );
        assert!(matches!(
            result,
            Err(HarvestError::Config(ConfigError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_probe_writes_nothing() {
        let source = ScriptedSource {
            pages: three_pages(),
            fail_on: None,
        };
        let coordinator = coordinator(source, test_config(8, "follow"));

        assert_eq!(coordinator.probe().await.unwrap(), PageCount::Boundary(4));
        let storage = coordinator.storage();
        assert!(storage.lock().unwrap().get_latest_run().unwrap().is_none());
    }
}
