//! Concurrent traversal of a forest whose children are discovered lazily.
//!
//! The walker feeds a fixed pool of worker tasks from a small bounded queue.
//! Visiting a node decides whether its children are visited at all, and with
//! which visitor, so every subtree can carry its own state. The only ordering
//! guarantee is that a node is visited after its parent.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::error::{Error, MultiError, Result};

/// Capacity of the queue shared by all workers.
pub const QUEUE_CAPACITY: usize = 8;

/// Decides what to do at each node of a walk.
///
/// Called concurrently for different subtrees.
pub trait Visitor<N>: Sized + Send + Sync + 'static {
    /// Visit `node`.
    ///
    /// `Some(visitor)` continues into the node's children with that visitor;
    /// `None` prunes the subtree.
    fn visit(&self, node: &N) -> impl Future<Output = Result<Option<Self>>> + Send;
}

/// How a walk discovers children and how wide it runs.
#[derive(Debug, Clone)]
pub struct WalkConfig<C> {
    /// Maximum number of nodes visited at the same time.
    ///
    /// Zero means the available parallelism.
    pub concurrency: usize,

    /// Lists the children of a node. Only called for nodes whose visit
    /// returned a visitor.
    pub children: C,
}

/// A node waiting to be visited, with the visitor chosen by its parent.
struct Task<N, V> {
    node: N,
    visitor: V,
}

struct Walker<N, V, C> {
    tasks: mpsc::Sender<Task<N, V>>,
    incoming: AsyncMutex<mpsc::Receiver<Task<N, V>>>,

    /// Tasks queued, buffered, or being visited. The walk ends at zero.
    outstanding: AtomicUsize,
    finished: Notify,

    children: C,
    errors: Mutex<MultiError>,
}

/// Visit `roots` and, transitively, the children of every node whose visit
/// asks for them.
///
/// Failures and panics are attributed to the node that raised them, named by
/// its `Display` form, and do not stop the rest of the walk; all of them are
/// returned together.
///
/// Dropping the returned future aborts the workers.
///
/// # Errors
/// Returns the aggregate of every visit and children-lookup failure.
pub async fn walk<N, V, C, Fut>(config: WalkConfig<C>, roots: Vec<N>, visitor: V) -> Result<()>
where
    N: fmt::Display + Send + Sync + 'static,
    V: Visitor<N> + Clone,
    C: Fn(N) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<N>>> + Send + 'static,
{
    if roots.is_empty() {
        return Ok(());
    }

    let concurrency = effective_concurrency(config.concurrency);
    debug!(roots = roots.len(), concurrency, "starting walk");

    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let walker = Arc::new(Walker {
        tasks: tx,
        incoming: AsyncMutex::new(rx),
        outstanding: AtomicUsize::new(roots.len()),
        finished: Notify::new(),
        children: config.children,
        errors: Mutex::new(MultiError::new()),
    });

    let mut workers = JoinSet::new();

    // Seed from a separate task: there may be more roots than the queue holds.
    let seeder = Arc::clone(&walker);
    workers.spawn(async move {
        for node in roots {
            let task = Task {
                node,
                visitor: visitor.clone(),
            };
            if seeder.tasks.send(task).await.is_err() {
                return;
            }
        }
    });

    for _ in 0..concurrency {
        let worker = Arc::clone(&walker);
        workers.spawn(async move { worker.work().await });
    }

    walker.finished.notified().await;
    workers.shutdown().await;

    let errors = std::mem::take(
        &mut *walker
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner),
    );
    errors.into_result()
}

fn effective_concurrency(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

impl<N, V, C, Fut> Walker<N, V, C>
where
    N: fmt::Display + Send + Sync + 'static,
    V: Visitor<N> + Clone,
    C: Fn(N) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<N>>> + Send + 'static,
{
    async fn work(&self) {
        // Children that did not fit in the shared queue yet.
        let mut pending = VecDeque::new();

        loop {
            while let Some(task) = pending.pop_front() {
                match self.tasks.try_send(task) {
                    Ok(()) => {}
                    Err(TrySendError::Full(task) | TrySendError::Closed(task)) => {
                        pending.push_front(task);
                        break;
                    }
                }
            }

            // A worker only waits for the queue once its own backlog is
            // empty; otherwise every worker could sit on work nobody receives.
            let task = match pending.pop_front() {
                Some(task) => task,
                None => {
                    let Some(task) = self.incoming.lock().await.recv().await else {
                        return;
                    };
                    task
                }
            };

            let node = task.node.to_string();
            let spawned = match AssertUnwindSafe(self.visit(task)).catch_unwind().await {
                Ok(Ok(children)) => children,
                Ok(Err(err)) => {
                    self.record(node, err);
                    Vec::new()
                }
                Err(payload) => {
                    self.record(node, panic_error(payload));
                    Vec::new()
                }
            };

            let count = spawned.len();
            pending.extend(spawned);
            self.settle(count);
        }
    }

    async fn visit(&self, task: Task<N, V>) -> Result<Vec<Task<N, V>>> {
        let Some(next) = task.visitor.visit(&task.node).await? else {
            trace!("subtree pruned");
            return Ok(Vec::new());
        };

        let children = (self.children)(task.node).await?;
        Ok(children
            .into_iter()
            .map(|node| Task {
                node,
                visitor: next.clone(),
            })
            .collect())
    }

    fn record(&self, node: String, err: Error) {
        debug!(%node, error = %err, "visit failed");
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Error::Node {
                node,
                source: Box::new(err),
            });
    }

    /// Account for one finished task that produced `spawned` new ones.
    fn settle(&self, spawned: usize) {
        if spawned > 0 {
            self.outstanding.fetch_add(spawned - 1, Ordering::AcqRel);
        } else if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finished.notify_one();
        }
    }
}

/// Turn a panic payload into the error reported for its node.
fn panic_error(payload: Box<dyn Any + Send>) -> Error {
    let payload = match payload.downcast::<Error>() {
        Ok(err) => return *err,
        Err(payload) => payload,
    };
    let message = match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "non-string payload".to_string(), |s| (*s).to_string()),
    };
    Error::Panic(message)
}
