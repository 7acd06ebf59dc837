//! Run registry
//!
//! Tracks every top-level run from spawn until it settles, so callers can wait for all
//! in-flight work (`drain`) or forget it (`reset`).

use std::future::Future;
use std::sync::Mutex;

use tokio_util::task::task_tracker::TrackedFuture;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::interrupt::lock;

#[derive(Debug, Default)]
pub struct RunRegistry {
    tracker: Mutex<TaskTracker>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `run` until it completes or is dropped
    pub fn track<F: Future>(&self, run: F) -> TrackedFuture<F> {
        lock(&self.tracker).track_future(run)
    }

    /// Number of runs that have not settled yet
    pub fn in_flight(&self) -> usize {
        lock(&self.tracker).len()
    }

    /// Wait until every tracked run has settled.
    ///
    /// Runs that succeed, fail or panic all count as settled. Runs started while draining
    /// are waited for as well.
    pub async fn drain(&self) {
        let tracker = lock(&self.tracker).clone();
        debug!(in_flight = tracker.len(), "Draining runs");

        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }

    /// Forget every tracked run without waiting for it
    pub fn reset(&self) {
        let previous = std::mem::take(&mut *lock(&self.tracker));
        debug!(forgotten = previous.len(), "Registry reset");
    }
}
