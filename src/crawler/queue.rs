//! Unbounded FIFO job queue
//!
//! Each crawler unit owns one queue. Handles are cheap clones of the same
//! queue, so another unit can hold a handle and `enqueue` into it while the
//! owning unit dequeues.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

struct QueueInner<T> {
    jobs: Mutex<VecDeque<T>>,
    notify: Notify,
}

/// Shared handle to a FIFO queue of jobs
pub struct JobQueue<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> Clone for JobQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QueueInner {
                jobs: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
            }),
        }
    }

    // A panic while holding the lock cannot leave the deque half-modified,
    // so a poisoned lock is still safe to use.
    fn jobs(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a job to the tail and wakes an idle consumer
    pub fn enqueue(&self, job: T) {
        self.jobs().push_back(job);
        self.inner.notify.notify_one();
    }

    /// Appends every job in order
    pub fn enqueue_all<I: IntoIterator<Item = T>>(&self, jobs: I) {
        let added = {
            let mut queue = self.jobs();
            let before = queue.len();
            queue.extend(jobs);
            queue.len() - before
        };

        if added > 0 {
            self.inner.notify.notify_one();
        }
    }

    /// Removes and returns the head job, or `None` when there is no work
    pub fn try_dequeue(&self) -> Option<T> {
        self.jobs().pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Resolves after the next `enqueue`
    ///
    /// An enqueue that happened while nobody was waiting is remembered, so
    /// this returns immediately in that case.
    pub async fn job_available(&self) {
        self.inner.notify.notified().await;
    }
}

impl<T: Clone> JobQueue<T> {
    /// Copies the queued jobs, head first
    pub fn snapshot(&self) -> Vec<T> {
        self.jobs().iter().cloned().collect()
    }
}
