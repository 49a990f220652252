//! Chapter download jobs: status machine, snapshots and the shared handle
//! workers and callers use to observe a job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

use crate::chapter::{ChapterRef, SourceId};

/// Job identifier, unique within one `DownloadManager`.
pub type JobId = u64;

/// Lifecycle of a job: Queued -> Running -> {Completed | Failed | Cancelled},
/// or Queued -> Cancelled when drained before it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// True once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Queued or running: the chapter is occupied by this job.
    pub fn is_busy(self) -> bool {
        !self.is_terminal()
    }

    fn can_become(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Running | JobStatus::Cancelled) => true,
            (JobStatus::Running, n) => n.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a job. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub chapter: ChapterRef,
    pub source: SourceId,
    pub status: JobStatus,
    pub enqueued_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
    /// Failure message when `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// How a job ended; applied by the worker that ran it (or by the drain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Completed,
    Failed(String),
    Cancelled,
}

impl Outcome {
    fn status(&self) -> JobStatus {
        match self {
            Outcome::Completed => JobStatus::Completed,
            Outcome::Failed(_) => JobStatus::Failed,
            Outcome::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// Shared handle to a job. Cheap to clone; every clone observes the same state.
#[derive(Clone)]
pub struct JobHandle {
    state: Arc<watch::Sender<Job>>,
}

impl JobHandle {
    pub(crate) fn new(id: JobId, chapter: ChapterRef, source: SourceId) -> Self {
        let job = Job {
            id,
            chapter,
            source,
            status: JobStatus::Queued,
            enqueued_at: unix_now(),
            started_at: None,
            finished_at: None,
            error: None,
        };
        let (tx, _rx) = watch::channel(job);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn id(&self) -> JobId {
        self.state.borrow().id
    }

    pub fn chapter(&self) -> ChapterRef {
        self.state.borrow().chapter
    }

    pub fn source(&self) -> SourceId {
        self.state.borrow().source.clone()
    }

    pub fn status(&self) -> JobStatus {
        self.state.borrow().status
    }

    pub fn snapshot(&self) -> Job {
        self.state.borrow().clone()
    }

    /// Waits until the job reaches a terminal status and returns its final snapshot.
    pub async fn wait(&self) -> Job {
        let mut rx = self.state.subscribe();
        if let Ok(job) = rx.wait_for(|job| job.status.is_terminal()).await {
            return job.clone();
        }
        self.snapshot()
    }

    /// Queued -> Running. Returns false if the job was already cancelled.
    pub(crate) fn begin(&self) -> bool {
        self.state.send_if_modified(|job| {
            if !job.status.can_become(JobStatus::Running) {
                return false;
            }
            job.status = JobStatus::Running;
            job.started_at = Some(unix_now());
            true
        })
    }

    /// Applies a terminal outcome. Returns false if the job had already finished.
    pub(crate) fn finish(&self, outcome: Outcome) -> bool {
        self.state.send_if_modified(|job| {
            let next = outcome.status();
            if !job.status.can_become(next) {
                return false;
            }
            job.status = next;
            job.finished_at = Some(unix_now());
            if let Outcome::Failed(msg) = &outcome {
                job.error = Some(msg.clone());
            }
            true
        })
    }

    pub(crate) fn same_job(&self, other: &JobHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JobHandle").field(&*self.state.borrow()).finish()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
