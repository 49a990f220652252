//! FIFO backlog of jobs waiting for a worker.
//!
//! Unbounded: duplication is bounded by the active set, not by queue depth.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::job::JobHandle;

#[derive(Default)]
pub struct JobQueue {
    pending: Mutex<VecDeque<JobHandle>>,
    available: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job: JobHandle) {
        self.lock().push_back(job);
        self.available.notify_one();
    }

    pub fn try_pop(&self) -> Option<JobHandle> {
        self.lock().pop_front()
    }

    /// Waits for the next job. Returns `None` once `stop` is cancelled.
    pub async fn pop(&self, stop: &CancellationToken) -> Option<JobHandle> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the
            // await still wakes us.
            notified.as_mut().enable();

            if stop.is_cancelled() {
                return None;
            }
            if let Some(job) = self.try_pop() {
                return Some(job);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = stop.cancelled() => return None,
            }
        }
    }

    /// Removes every job that has not been picked up yet, in queue order.
    pub fn drain(&self) -> Vec<JobHandle> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<JobHandle>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
