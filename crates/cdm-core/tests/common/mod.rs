//! Shared fixtures for the integration tests.

#![allow(dead_code)]

pub mod chapter_server;

use async_trait::async_trait;
use bytes::Bytes;
use cdm_core::source::{ChapterContent, ChapterSource, SourceRegistry};
use cdm_core::storage::FsChapterStore;
use cdm_core::{ChapterRef, DownloadManager, FetchError, SourceId};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const SOURCE: &str = "scripted";

/// In-memory source with configurable latency, failures and panics. Records how many
/// fetches ran and whether two fetches of one chapter ever overlapped.
pub struct ScriptedSource {
    id: SourceId,
    delay: Duration,
    failing: HashSet<ChapterRef>,
    panicking: HashSet<ChapterRef>,
    in_flight: Mutex<HashSet<ChapterRef>>,
    overlap_seen: AtomicBool,
    started: AtomicUsize,
    cancelled: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(delay: Duration) -> Self {
        Self::named(SOURCE, delay)
    }

    pub fn named(id: &str, delay: Duration) -> Self {
        Self {
            id: SourceId::new(id),
            delay,
            failing: HashSet::new(),
            panicking: HashSet::new(),
            in_flight: Mutex::new(HashSet::new()),
            overlap_seen: AtomicBool::new(false),
            started: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, chapter: ChapterRef) -> Self {
        self.failing.insert(chapter);
        self
    }

    pub fn panicking(mut self, chapter: ChapterRef) -> Self {
        self.panicking.insert(chapter);
        self
    }

    pub fn overlap_seen(&self) -> bool {
        self.overlap_seen.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}

/// Removes the chapter from the in-flight set even if the fetch is dropped.
struct InFlight<'a> {
    source: &'a ScriptedSource,
    chapter: ChapterRef,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.source.in_flight.lock().unwrap().remove(&self.chapter);
    }
}

#[async_trait]
impl ChapterSource for ScriptedSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn fetch(
        &self,
        chapter: &ChapterRef,
        cancel: &CancellationToken,
    ) -> Result<ChapterContent, FetchError> {
        if !self.in_flight.lock().unwrap().insert(*chapter) {
            self.overlap_seen.store(true, Ordering::SeqCst);
        }
        let _guard = InFlight {
            source: self,
            chapter: *chapter,
        };
        self.started.fetch_add(1, Ordering::SeqCst);

        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {}
            _ = cancel.cancelled() => {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                return Err(FetchError::Cancelled);
            }
        }

        if self.panicking.contains(chapter) {
            panic!("scripted panic while fetching {chapter}");
        }
        if self.failing.contains(chapter) {
            return Err(FetchError::Unreachable(format!("chapter {chapter} is offline")));
        }
        Ok(ChapterContent::new(vec![
            Bytes::from(format!("{chapter} page 1")),
            Bytes::from(format!("{chapter} page 2")),
        ]))
    }
}

pub fn source_id() -> SourceId {
    SourceId::new(SOURCE)
}

pub fn manager_with(source: Arc<ScriptedSource>, dir: &Path, workers: usize) -> DownloadManager {
    manager_with_all(vec![source], dir, workers)
}

pub fn manager_with_all(sources: Vec<Arc<ScriptedSource>>, dir: &Path, workers: usize) -> DownloadManager {
    let mut registry = SourceRegistry::new();
    for source in sources {
        registry.register(source);
    }
    DownloadManager::new(registry, Arc::new(FsChapterStore::new(dir)), workers)
}

pub fn chapters(manga: i64, ids: std::ops::RangeInclusive<i64>) -> Vec<ChapterRef> {
    ids.map(|c| ChapterRef::new(manga, c)).collect()
}
