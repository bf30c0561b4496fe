//! Concurrent upsert of comment trees
//!
//! A fixed pool of writer tasks drains one shared queue. The page loop only
//! enqueues; it never waits on a write. `Dispatcher::finish` is the single
//! point where the run waits for outstanding writes.

use crate::ingest::context::RunContext;
use crate::model::Comment;
use crate::storage::{CommentRecord, Storage, StorageError, UpsertOutcome};
use crate::HarvestError;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;

/// A node whose write failed
#[derive(Debug)]
pub struct NodeFailure {
    pub id: u64,
    pub error: StorageError,
}

/// Aggregated outcome of every node handed to the dispatcher
#[derive(Debug, Default)]
pub struct DispatchSummary {
    /// Nodes taken off the queue
    pub visited: u64,
    pub inserted: u64,
    pub updated: u64,
    /// Nodes dropped after a fail-fast abandon
    pub skipped: u64,
    pub failures: Vec<NodeFailure>,
}

impl DispatchSummary {
    pub fn failed(&self) -> u64 {
        self.failures.len() as u64
    }

    fn merge(&mut self, other: DispatchSummary) {
        self.visited += other.visited;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }
}

type SharedQueue = Arc<tokio::sync::Mutex<UnboundedReceiver<Comment>>>;

/// Bounded writer pool for one run
pub struct Dispatcher {
    sender: UnboundedSender<Comment>,
    workers: JoinSet<DispatchSummary>,
    enqueued: u64,
}

impl Dispatcher {
    /// Spawns `ctx.workers` writer tasks over `storage`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S: Storage + 'static>(storage: Arc<Mutex<S>>, ctx: &RunContext) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: SharedQueue = Arc::new(tokio::sync::Mutex::new(receiver));

        let mut workers = JoinSet::new();
        for worker in 0..ctx.workers {
            let queue = Arc::clone(&queue);
            let storage = Arc::clone(&storage);
            let ctx = ctx.clone();

            workers.spawn(async move { run_writer(worker, queue, storage, ctx).await });
        }

        tracing::debug!("Started {} writers", ctx.workers);

        Self {
            sender,
            workers,
            enqueued: 0,
        }
    }

    /// Enqueues every node of `root`'s tree in pre-order
    ///
    /// Children are detached from their parent before the parent is queued,
    /// so each node travels alone. Returns the number of nodes enqueued.
    pub fn dispatch(&mut self, root: Comment) -> usize {
        let mut stack = vec![root];
        let mut count = 0;

        while let Some(mut node) = stack.pop() {
            let children = std::mem::take(&mut node.replies);
            // Reverse so the first reply is popped first
            stack.extend(children.into_iter().rev());

            let id = node.id;
            if self.sender.send(node).is_err() {
                // Every writer has exited; nothing can drain the queue
                tracing::error!("Writer pool is gone, dropping comment {}", id);
                continue;
            }
            count += 1;
        }

        self.enqueued += count as u64;
        count
    }

    /// Nodes enqueued so far
    pub fn enqueued(&self) -> u64 {
        self.enqueued
    }

    /// Closes the queue and waits for every writer to drain it
    pub async fn finish(self) -> Result<DispatchSummary, HarvestError> {
        let Dispatcher {
            sender,
            mut workers,
            enqueued,
        } = self;
        drop(sender);

        let mut summary = DispatchSummary::default();
        while let Some(result) = workers.join_next().await {
            let tally = result.map_err(|e| HarvestError::Task(e.to_string()))?;
            summary.merge(tally);
        }

        tracing::debug!(
            "Writers drained {} of {} enqueued nodes",
            summary.visited,
            enqueued
        );

        Ok(summary)
    }
}

async fn run_writer<S: Storage>(
    worker: usize,
    queue: SharedQueue,
    storage: Arc<Mutex<S>>,
    ctx: RunContext,
) -> DispatchSummary {
    let mut tally = DispatchSummary::default();

    loop {
        let next = queue.lock().await.recv().await;
        let Some(node) = next else {
            break;
        };
        tally.visited += 1;

        if ctx.discard.is_cancelled() {
            tally.skipped += 1;
            continue;
        }

        let record = CommentRecord::from_comment(&node);
        match write_record(&storage, &record) {
            Ok(UpsertOutcome::Inserted) => tally.inserted += 1,
            Ok(UpsertOutcome::Updated) => tally.updated += 1,
            Err(error) => {
                tracing::warn!("Writer {} failed on comment {}: {}", worker, record.id, error);
                if ctx.fail_fast {
                    ctx.abandon();
                }
                tally.failures.push(NodeFailure {
                    id: record.id,
                    error,
                });
            }
        }
    }

    tally
}

fn write_record<S: Storage>(
    storage: &Mutex<S>,
    record: &CommentRecord,
) -> Result<UpsertOutcome, StorageError> {
    let mut guard = storage.lock().map_err(|_| StorageError::LockPoisoned)?;
    guard.upsert_comment(record)
}
