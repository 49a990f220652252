//! Download orchestrator.
//!
//! `DownloadManager` owns the active set, the queue and the worker pool.
//! Enqueueing, start, stop and delete all go through one lifecycle lock, so a
//! chapter can never gain a job while its content is being deleted and stop
//! never returns with a job left unsettled.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::active::ActiveSet;
use crate::chapter::{ChapterRef, SourceId};
use crate::config::CdmConfig;
use crate::error::{ConsistencyError, DeleteError};
use crate::job::{Job, JobHandle, Outcome};
use crate::queue::JobQueue;
use crate::source::SourceRegistry;
use crate::storage::{ChapterStore, FsChapterStore};
use crate::worker::{Pipeline, WorkerPool};

/// Result of [`DownloadManager::download_chapters`].
#[derive(Debug, Default)]
pub struct EnqueueReport {
    /// New jobs, in input order.
    pub queued: Vec<JobHandle>,
    /// Chapters skipped because a job already holds them.
    pub already_active: Vec<ChapterRef>,
}

pub struct DownloadManager {
    pipeline: Arc<Pipeline>,
    pool: Mutex<Option<WorkerPool>>,
    running: AtomicBool,
    next_id: AtomicU64,
    workers: usize,
}

impl DownloadManager {
    pub fn new(sources: SourceRegistry, store: Arc<dyn ChapterStore>, workers: usize) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                active: ActiveSet::new(),
                queue: JobQueue::new(),
                sources,
                store,
            }),
            pool: Mutex::new(None),
            running: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            workers: workers.max(1),
        }
    }

    /// Sources from `[sources]`, chapters stored under the download dir.
    pub fn from_config(cfg: &CdmConfig) -> Result<Self> {
        let sources = SourceRegistry::from_config(cfg)?;
        let download_dir = cfg.resolve_download_dir()?;
        tracing::debug!(path = %download_dir.display(), workers = cfg.workers, "download manager configured");
        Ok(Self::new(
            sources,
            Arc::new(FsChapterStore::new(download_dir)),
            cfg.workers,
        ))
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.pipeline.sources
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queues one job per chapter not already held by a job. Does not start the pool.
    pub async fn download_chapters(&self, source: &SourceId, chapters: &[ChapterRef]) -> EnqueueReport {
        let _lifecycle = self.pool.lock().await;
        let mut report = EnqueueReport::default();
        for chapter in chapters {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let job = JobHandle::new(id, *chapter, source.clone());
            if !self.pipeline.active.try_reserve(&job) {
                tracing::debug!(%chapter, "chapter already has an active job");
                report.already_active.push(*chapter);
                continue;
            }
            tracing::info!(job = id, %chapter, %source, "queued chapter download");
            self.pipeline.queue.push(job.clone());
            report.queued.push(job);
        }
        report
    }

    /// Starts the worker pool. No-op if already running.
    pub async fn start_downloads(&self) {
        let mut pool = self.pool.lock().await;
        if pool.is_some() {
            return;
        }
        *pool = Some(WorkerPool::spawn(Arc::clone(&self.pipeline), self.workers));
        self.running.store(true, Ordering::Release);
        tracing::info!(workers = self.workers, queued = self.pipeline.queue.len(), "downloads started");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops the pool: cancels running jobs, waits for every worker to exit,
    /// then cancels everything still queued. No job is queued or running when
    /// this returns. No-op on an idle, empty pipeline.
    pub async fn destroy_subscriptions(&self) {
        let mut pool = self.pool.lock().await;
        if let Some(workers) = pool.take() {
            self.running.store(false, Ordering::Release);
            workers.shutdown().await;
            tracing::info!("downloads stopped");
        }
        let drained = self.pipeline.queue.drain();
        if !drained.is_empty() {
            tracing::info!(cancelled = drained.len(), "cancelled queued downloads");
        }
        for job in drained {
            self.pipeline.active.settle(&job, Outcome::Cancelled);
        }
    }

    /// Whether the chapter's content is in storage. Ignores active jobs.
    pub async fn is_chapter_downloaded(&self, chapter: &ChapterRef) -> Result<bool> {
        self.pipeline.store.exists(chapter).await
    }

    /// Removes stored content. Refused while the chapter has a queued or running
    /// job; callers stop the pool first and retry once the job has settled.
    pub async fn delete_chapter(&self, chapter: &ChapterRef) -> Result<(), DeleteError> {
        let _lifecycle = self.pool.lock().await;
        if let Some(job) = self.pipeline.active.lookup(chapter) {
            return Err(ConsistencyError {
                chapter: *chapter,
                status: job.status(),
            }
            .into());
        }
        self.pipeline
            .store
            .delete(chapter)
            .await
            .map_err(DeleteError::Storage)?;
        tracing::info!(%chapter, "deleted chapter content");
        Ok(())
    }

    /// The queued or running job for the chapter, if any.
    pub fn active_download(&self, chapter: &ChapterRef) -> Option<Job> {
        self.pipeline
            .active
            .lookup(chapter)
            .map(|job| job.snapshot())
            .filter(|job| job.status.is_busy())
    }

    pub fn active_downloads(&self) -> Vec<Job> {
        self.pipeline.active.jobs()
    }

    pub fn queued_len(&self) -> usize {
        self.pipeline.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::job::JobStatus;
    use crate::source::{ChapterContent, ChapterSource};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Returns one page after `delay`, or never finishes when `hang` is set.
    struct SlowSource {
        id: SourceId,
        delay: Duration,
        hang: bool,
    }

    #[async_trait]
    impl ChapterSource for SlowSource {
        fn id(&self) -> &SourceId {
            &self.id
        }

        async fn fetch(
            &self,
            _chapter: &ChapterRef,
            _cancel: &CancellationToken,
        ) -> Result<ChapterContent, FetchError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(self.delay).await;
            Ok(ChapterContent::single(Bytes::from_static(b"page")))
        }
    }

    fn manager(dir: &std::path::Path, hang: bool) -> DownloadManager {
        let source = SlowSource {
            id: SourceId::new("slow"),
            delay: Duration::from_millis(10),
            hang,
        };
        let sources = SourceRegistry::new().with(Arc::new(source));
        DownloadManager::new(sources, Arc::new(FsChapterStore::new(dir)), 2)
    }

    #[tokio::test]
    async fn enqueue_reports_duplicates_in_same_call() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), false);
        let a = ChapterRef::new(1, 1);
        let report = m
            .download_chapters(&SourceId::new("slow"), &[a, a, ChapterRef::new(1, 2)])
            .await;
        assert_eq!(report.queued.len(), 2);
        assert_eq!(report.already_active, vec![a]);
        assert_eq!(m.queued_len(), 2);
        assert!(!m.is_running());
    }

    #[tokio::test]
    async fn start_runs_queued_jobs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), false);
        let a = ChapterRef::new(1, 1);
        let report = m.download_chapters(&SourceId::new("slow"), &[a]).await;
        m.start_downloads().await;
        assert!(m.is_running());
        let job = report.queued[0].wait().await;
        assert_eq!(job.status, JobStatus::Completed);
        assert!(m.is_chapter_downloaded(&a).await.unwrap());
        assert!(m.active_download(&a).is_none());
        m.destroy_subscriptions().await;
        assert!(!m.is_running());
    }

    #[tokio::test]
    async fn stop_cancels_running_and_queued_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), true);
        let chapters: Vec<ChapterRef> = (1..=5).map(|c| ChapterRef::new(1, c)).collect();
        let report = m.download_chapters(&SourceId::new("slow"), &chapters).await;
        m.start_downloads().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(5), m.destroy_subscriptions())
            .await
            .expect("stop must finish");
        for job in &report.queued {
            assert_eq!(job.status(), JobStatus::Cancelled);
        }
        assert!(m.active_downloads().is_empty());
        for c in &chapters {
            assert!(!m.is_chapter_downloaded(c).await.unwrap());
        }
    }

    #[tokio::test]
    async fn delete_is_refused_while_job_is_active() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), false);
        let a = ChapterRef::new(2, 3);
        m.download_chapters(&SourceId::new("slow"), &[a]).await;
        match m.delete_chapter(&a).await {
            Err(DeleteError::Active(e)) => {
                assert_eq!(e.chapter, a);
                assert_eq!(e.status, JobStatus::Queued);
            }
            other => panic!("expected consistency error, got {other:?}"),
        }
        m.destroy_subscriptions().await;
        m.delete_chapter(&a).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_source_fails_only_its_job() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), false);
        let lost = m
            .download_chapters(&SourceId::new("gone"), &[ChapterRef::new(1, 1)])
            .await;
        let ok = m
            .download_chapters(&SourceId::new("slow"), &[ChapterRef::new(1, 2)])
            .await;
        m.start_downloads().await;
        let lost = lost.queued[0].wait().await;
        assert_eq!(lost.status, JobStatus::Failed);
        assert!(lost.error.unwrap().contains("gone"));
        assert_eq!(ok.queued[0].wait().await.status, JobStatus::Completed);
        m.destroy_subscriptions().await;
    }
}
