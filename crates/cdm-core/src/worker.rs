//! Worker pool: a fixed number of tasks pulling jobs off the queue.
//!
//! Each worker loops: dequeue -> mark running -> fetch from the job's source ->
//! store -> settle. A failed chapter only fails its own job. Stopping the pool
//! cancels one shared token; idle workers wake up and exit, and a running fetch
//! is abandoned at its next await point, leaving storage untouched.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::active::ActiveSet;
use crate::error::FetchError;
use crate::job::{JobHandle, Outcome};
use crate::queue::JobQueue;
use crate::source::SourceRegistry;
use crate::storage::ChapterStore;

/// State shared by the orchestrator and every worker.
pub(crate) struct Pipeline {
    pub(crate) active: ActiveSet,
    pub(crate) queue: JobQueue,
    pub(crate) sources: SourceRegistry,
    pub(crate) store: Arc<dyn ChapterStore>,
}

/// Running workers and the token that stops them.
pub(crate) struct WorkerPool {
    stop: CancellationToken,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Spawns `size` workers (at least one) on the current runtime.
    pub(crate) fn spawn(pipeline: Arc<Pipeline>, size: usize) -> Self {
        let stop = CancellationToken::new();
        let mut workers = JoinSet::new();
        for worker in 0..size.max(1) {
            let pipeline = Arc::clone(&pipeline);
            let stop = stop.clone();
            workers.spawn(async move { run_worker(worker, &pipeline, &stop).await });
        }
        Self { stop, workers }
    }

    /// Signals every worker and waits until all of them have exited. Every job
    /// a worker had picked up is terminal when this returns.
    pub(crate) async fn shutdown(mut self) {
        self.stop.cancel();
        while let Some(res) = self.workers.join_next().await {
            if let Err(e) = res {
                tracing::warn!("worker task join: {}", e);
            }
        }
    }
}

async fn run_worker(worker: usize, pipeline: &Pipeline, stop: &CancellationToken) {
    tracing::debug!(worker, "worker started");
    while let Some(job) = pipeline.queue.pop(stop).await {
        execute(pipeline, job, stop).await;
    }
    tracing::debug!(worker, "worker stopped");
}

/// Settles the job when dropped. Without a recorded outcome (the worker
/// stopped before or while running it) the job ends cancelled.
struct Settle<'a> {
    active: &'a ActiveSet,
    job: JobHandle,
    outcome: Option<Outcome>,
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or(Outcome::Cancelled);
        self.active.settle(&self.job, outcome);
    }
}

async fn execute(pipeline: &Pipeline, job: JobHandle, stop: &CancellationToken) {
    let mut settle = Settle {
        active: &pipeline.active,
        job: job.clone(),
        outcome: None,
    };
    if stop.is_cancelled() || !job.begin() {
        return;
    }

    let chapter = job.chapter();
    tracing::info!(job = job.id(), %chapter, source = %job.source(), "download started");
    // A panicking source fails its own job; the worker keeps pulling.
    let outcome = match AssertUnwindSafe(run(pipeline, &job, stop)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Outcome::Failed(format!("source panicked: {}", panic_message(&*panic))),
    };
    match &outcome {
        Outcome::Completed => tracing::info!(job = job.id(), %chapter, "download completed"),
        Outcome::Failed(msg) => tracing::warn!(job = job.id(), %chapter, "download failed: {}", msg),
        Outcome::Cancelled => tracing::info!(job = job.id(), %chapter, "download cancelled"),
    }
    settle.outcome = Some(outcome);
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

async fn run(pipeline: &Pipeline, job: &JobHandle, stop: &CancellationToken) -> Outcome {
    let chapter = job.chapter();
    let source_id = job.source();
    let Some(source) = pipeline.sources.get(&source_id) else {
        return Outcome::Failed(FetchError::UnknownSource(source_id).to_string());
    };

    let fetched = tokio::select! {
        biased;
        _ = stop.cancelled() => return Outcome::Cancelled,
        res = source.fetch(&chapter, stop) => res,
    };
    let content = match fetched {
        Ok(content) => content,
        Err(FetchError::Cancelled) => return Outcome::Cancelled,
        Err(e) => return Outcome::Failed(e.to_string()),
    };
    if content.is_empty() {
        return Outcome::Failed(FetchError::Malformed("source returned no pages".into()).to_string());
    }
    if stop.is_cancelled() {
        return Outcome::Cancelled;
    }

    match pipeline.store.write(&chapter, &content).await {
        Ok(()) => Outcome::Completed,
        Err(e) => Outcome::Failed(format!("{:#}", e)),
    }
}
