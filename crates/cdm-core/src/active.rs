//! Registry of in-flight jobs, one per chapter.
//!
//! A chapter is reserved when its job is enqueued and released by `settle` when
//! the job reaches a terminal status. Reservation never overwrites: a second
//! job for the same chapter is refused, which is what keeps duplicate
//! downloads out.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::chapter::ChapterRef;
use crate::job::{Job, JobHandle, Outcome};

#[derive(Default)]
pub struct ActiveSet {
    jobs: RwLock<HashMap<ChapterRef, JobHandle>>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `job` under its chapter if no job holds it. Returns whether the
    /// reservation succeeded.
    pub fn try_reserve(&self, job: &JobHandle) -> bool {
        let mut jobs = self.write();
        match jobs.entry(job.chapter()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(job.clone());
                true
            }
        }
    }

    pub fn lookup(&self, chapter: &ChapterRef) -> Option<JobHandle> {
        self.read().get(chapter).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshots of every in-flight job, ordered by job id.
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().values().map(JobHandle::snapshot).collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    /// Applies the terminal outcome and drops the reservation under one lock,
    /// so no observer sees a finished job still holding its chapter.
    pub(crate) fn settle(&self, job: &JobHandle, outcome: Outcome) {
        let mut jobs = self.write();
        job.finish(outcome);
        let chapter = job.chapter();
        if jobs.get(&chapter).is_some_and(|held| held.same_job(job)) {
            jobs.remove(&chapter);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ChapterRef, JobHandle>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ChapterRef, JobHandle>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
