//! Quota-exhaustion backoff
//!
//! The remote API resets quota windows on a fixed period, so the cool-down
//! is a fixed duration rather than exponential. It must be at least one
//! window long for the retried job to succeed.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fixed cool-down applied after a quota exhaustion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    cooldown: Duration,
}

impl BackoffPolicy {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Sleeps for the cool-down without blocking other tasks
    ///
    /// Returns `false` if `cancel` fired before the cool-down elapsed.
    pub async fn cool_down(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.cooldown) => true,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(15 * 60))
    }
}
