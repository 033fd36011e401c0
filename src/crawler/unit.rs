//! Crawler units: one job queue plus one fetch-and-persist stage
//!
//! A [`CrawlerUnit`] drives its [`Stage`] one job per turn. Each turn is a
//! failure-isolation boundary: nothing a stage raises escapes `run_once`.
//!
//! ```text
//!            ┌──────── empty ────────┐
//!            │  on_idle, idle wait   │
//!            ▼                       │
//!        RUNNING ── dequeue ── exec ─┼─ Ok ──────────► discard job
//!            ▲                       ├─ other error ─► log, drop job
//!            │                       └─ quota ───────► requeue at tail
//!            │                                              │
//!            └──────────── cool-down elapsed ◄──── BACKOFF ◄┘
//! ```

use crate::crawler::backoff::BackoffPolicy;
use crate::crawler::queue::JobQueue;
use crate::ExecError;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Unit-specific work plugged into a [`CrawlerUnit`]
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    type Job: fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Performs the work for one job
    ///
    /// A stage may record progress in `job`. When the unit requeues the job
    /// after quota exhaustion or cancellation, it requeues it as left here.
    async fn exec(&self, job: &mut Self::Job) -> Result<(), ExecError>;

    /// Called whenever the unit finds its queue empty
    async fn on_idle(&self, _queue: &JobQueue<Self::Job>) {}
}

/// Scheduling state of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Running,
    Backoff,
}

/// What a single `run_once` turn did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// Queue was empty
    Idle,
    /// Job finished successfully
    Completed,
    /// Job hit the quota, was requeued, and the cool-down elapsed
    Deferred,
    /// Job failed with a non-quota error and was discarded
    Dropped,
    /// Cancellation was observed; the loop should stop
    Cancelled,
}

/// Counters for one unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitStats {
    pub completed: u64,
    pub deferred: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    deferred: AtomicU64,
    dropped: AtomicU64,
}

/// Runs a [`Stage`] over its own FIFO queue
pub struct CrawlerUnit<S: Stage> {
    stage: S,
    queue: JobQueue<S::Job>,
    backoff: BackoffPolicy,
    idle_delay: Duration,
    status: watch::Sender<UnitStatus>,
    counters: Counters,
}

impl<S: Stage> CrawlerUnit<S> {
    pub fn new(stage: S, backoff: BackoffPolicy, idle_delay: Duration) -> Self {
        Self::with_queue(stage, JobQueue::new(), backoff, idle_delay)
    }

    /// Creates a unit around an existing queue handle
    pub fn with_queue(
        stage: S,
        queue: JobQueue<S::Job>,
        backoff: BackoffPolicy,
        idle_delay: Duration,
    ) -> Self {
        let (status, _) = watch::channel(UnitStatus::Running);
        Self {
            stage,
            queue,
            backoff,
            idle_delay,
            status,
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.stage.name()
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// Queues a job on this unit
    pub fn schedule(&self, job: impl Into<S::Job>) {
        let job = job.into();
        tracing::debug!(unit = self.name(), "Scheduled {}", job);
        self.queue.enqueue(job);
    }

    /// Handle for other units to produce work into this unit's queue
    pub fn queue(&self) -> &JobQueue<S::Job> {
        &self.queue
    }

    pub fn status(&self) -> UnitStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every status change
    pub fn watch_status(&self) -> watch::Receiver<UnitStatus> {
        self.status.subscribe()
    }

    pub fn stats(&self) -> UnitStats {
        UnitStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            deferred: self.counters.deferred.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Executes one cooperative turn
    ///
    /// Suspends briefly after every job, for the idle delay when the queue is
    /// empty, and for the full cool-down after a quota exhaustion. Every
    /// suspension also observes `cancel`.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Turn {
        if cancel.is_cancelled() {
            return Turn::Cancelled;
        }

        let Some(mut job) = self.queue.try_dequeue() else {
            self.stage.on_idle(&self.queue).await;
            tracing::trace!(unit = self.name(), "Queue empty");

            return tokio::select! {
                _ = cancel.cancelled() => Turn::Cancelled,
                _ = self.queue.job_available() => Turn::Idle,
                _ = tokio::time::sleep(self.idle_delay) => Turn::Idle,
            };
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.stage.exec(&mut job) => Some(result),
        };

        let Some(result) = result else {
            // Keep the interrupted job so a drained queue reflects all pending work.
            self.queue.enqueue(job);
            return Turn::Cancelled;
        };

        let turn = match result {
            Ok(()) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(unit = self.name(), "Completed {}", job);
                Turn::Completed
            }
            Err(ExecError::QuotaExceeded { endpoint, reset_at }) => {
                return self.defer(job, &endpoint, reset_at, cancel).await;
            }
            Err(e) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!(unit = self.name(), "Dropped {}: {}", job, e);
                Turn::Dropped
            }
        };

        // Let sibling units run even when this queue has a backlog.
        tokio::task::yield_now().await;
        turn
    }

    async fn defer(
        &self,
        job: S::Job,
        endpoint: &str,
        reset_at: Option<i64>,
        cancel: &CancellationToken,
    ) -> Turn {
        tracing::warn!(
            unit = self.name(),
            endpoint,
            reset_at,
            queued = self.queue.len() + 1,
            "Quota exceeded on {}; requeued, cooling down for {:?}",
            job,
            self.backoff.cooldown()
        );

        self.queue.enqueue(job);
        self.counters.deferred.fetch_add(1, Ordering::Relaxed);
        self.status.send_replace(UnitStatus::Backoff);

        let resumed = self.backoff.cool_down(cancel).await;

        self.status.send_replace(UnitStatus::Running);

        if resumed {
            tracing::info!(unit = self.name(), "Cool-down over, resuming");
            Turn::Deferred
        } else {
            Turn::Cancelled
        }
    }

    /// Calls `run_once` until cancellation
    pub async fn run_forever(&self, cancel: CancellationToken) {
        tracing::info!(unit = self.name(), queued = self.queue.len(), "Unit started");

        while self.run_once(&cancel).await != Turn::Cancelled {}

        let stats = self.stats();
        tracing::info!(
            unit = self.name(),
            completed = stats.completed,
            deferred = stats.deferred,
            dropped = stats.dropped,
            queued = self.queue.len(),
            "Unit stopped"
        );
    }
}

/// Spawns `unit.run_forever` on its own task
pub fn spawn_unit<S: Stage>(
    unit: Arc<CrawlerUnit<S>>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { unit.run_forever(cancel).await })
}
