//! Bounded worker pool for asynchronous cache rebuilds.
//!
//! The pool has an explicit lifecycle: [`RebuildScheduler::start`] spawns a fixed number
//! of worker tasks on the current tokio runtime, and [`RebuildScheduler::shutdown`]
//! closes the queue and waits for every queued rebuild to finish.

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::error::CacheError;

/// Configuration for RebuildScheduler.
#[derive(Debug, Clone)]
pub struct RebuildSchedulerConfig {
    /// Number of worker tasks executing rebuilds concurrently.
    pub workers: usize,

    /// Number of rebuilds that may wait for a free worker.
    /// Submissions beyond this are rejected with `CacheError::SchedulerFull`.
    pub queue_capacity: usize,
}

impl Default for RebuildSchedulerConfig {
    fn default() -> Self {
        RebuildSchedulerConfig {
            workers: 10,
            queue_capacity: 1024,
        }
    }
}

/// A snapshot of rebuild counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Rebuilds accepted into the queue.
    pub submitted: u64,
    /// Rebuilds that ran to completion.
    pub completed: u64,
    /// Rebuilds that returned an error or panicked.
    pub failed: u64,
}

impl RebuildStats {
    /// Rebuilds queued or running.
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed)
            .saturating_sub(self.failed)
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

struct RebuildTask {
    key: String,
    task: BoxFuture<'static, Result<(), CacheError>>,
}

/// Executes rebuild tasks on a fixed-size pool of tokio tasks.
///
/// A burst of submissions never spawns more than `workers` concurrent rebuilds;
/// the excess waits in a bounded queue. Tasks cannot be cancelled once accepted.
pub struct RebuildScheduler {
    sender: RwLock<Option<mpsc::Sender<RebuildTask>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl RebuildScheduler {
    /// Start the pool on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn start(config: RebuildSchedulerConfig) -> Self {
        let worker_count = config.workers.max(1);
        let (sender, receiver) = mpsc::channel::<RebuildTask>(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let workers = (0..worker_count)
            .map(|id| {
                let receiver = receiver.clone();
                let counters = counters.clone();
                tokio::spawn(Self::worker_loop(id, receiver, counters))
            })
            .collect();

        tracing::info!(
            workers = worker_count,
            queue_capacity = config.queue_capacity,
            "rebuild scheduler started"
        );

        RebuildScheduler {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    async fn worker_loop(
        id: usize,
        receiver: Arc<Mutex<mpsc::Receiver<RebuildTask>>>,
        counters: Arc<Counters>,
    ) {
        loop {
            let next = { receiver.lock().await.recv().await };
            let Some(RebuildTask { key, task }) = next else {
                break;
            };

            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => {
                    counters.completed.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!(worker = id, key = %key, "rebuild completed");
                }
                Ok(Err(e)) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!(worker = id, key = %key, error = %e, "rebuild failed");
                }
                Err(_) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    tracing::error!(worker = id, key = %key, "rebuild panicked");
                }
            }
        }

        tracing::debug!(worker = id, "rebuild worker stopped");
    }

    /// Queue a rebuild. Returns as soon as the task is queued, never waits for it to run.
    ///
    /// `key` is only used for logging.
    pub async fn submit<F>(&self, key: impl Into<String>, task: F) -> Result<(), CacheError>
    where
        F: Future<Output = Result<(), CacheError>> + Send + 'static,
    {
        let sender = self.sender.read().await;
        let Some(sender) = sender.as_ref() else {
            return Err(CacheError::SchedulerClosed);
        };

        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        let task = RebuildTask {
            key: key.into(),
            task: task.boxed(),
        };

        sender.try_send(task).map_err(|e| {
            self.counters.submitted.fetch_sub(1, Ordering::SeqCst);
            match e {
                TrySendError::Full(task) => CacheError::SchedulerFull(task.key),
                TrySendError::Closed(_) => CacheError::SchedulerClosed,
            }
        })
    }

    /// Current counters.
    pub fn stats(&self) -> RebuildStats {
        RebuildStats {
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    /// Returns `true` once `shutdown` has been called.
    pub async fn is_closed(&self) -> bool {
        self.sender.read().await.is_none()
    }

    /// Stop accepting rebuilds and wait until every queued rebuild has run.
    ///
    /// Calling `shutdown` more than once is a no-op.
    pub async fn shutdown(&self) {
        self.sender.write().await.take();

        let workers = std::mem::take(&mut *self.workers.lock().await);
        if workers.is_empty() {
            return;
        }

        for result in join_all(workers).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "rebuild worker terminated abnormally");
            }
        }

        tracing::info!(stats = ?self.stats(), "rebuild scheduler drained");
    }
}
