//! Per-chapter download/delete requests, as issued by a management client.
//!
//! Every request runs under one master lock, so the stop -> delete -> restart
//! sequence of a delete is atomic with respect to every other request.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::chapter::{ChapterRef, SourceId};
use crate::error::{RequestError, UserError};
use crate::job::Job;
use crate::library::Library;
use crate::manager::DownloadManager;

/// Raw request parameters. Ids are parsed leniently: surrounding whitespace is
/// ignored and anything that is not an integer counts as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterRequest {
    pub manga_id: Option<String>,
    pub chapter_id: Option<String>,
    pub delete: bool,
}

impl ChapterRequest {
    pub fn download(manga_id: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            manga_id: Some(manga_id.into()),
            chapter_id: Some(chapter_id.into()),
            delete: false,
        }
    }

    pub fn delete(manga_id: impl Into<String>, chapter_id: impl Into<String>) -> Self {
        Self {
            delete: true,
            ..Self::download(manga_id, chapter_id)
        }
    }
}

/// What a successful request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Queued(Job),
    Deleted(ChapterRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterStatus {
    pub chapter: ChapterRef,
    pub source: SourceId,
    pub downloaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<Job>,
}

/// Parses an id the way query parameters are treated: trimmed, integer or nothing.
pub fn parse_id(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse().ok())
}

struct Target {
    chapter: ChapterRef,
    source: SourceId,
}

pub struct ChapterRequestHandler {
    manager: Arc<DownloadManager>,
    library: Arc<dyn Library>,
    master_lock: Mutex<()>,
}

impl ChapterRequestHandler {
    pub fn new(manager: Arc<DownloadManager>, library: Arc<dyn Library>) -> Self {
        Self {
            manager,
            library,
            master_lock: Mutex::new(()),
        }
    }

    pub fn manager(&self) -> &Arc<DownloadManager> {
        &self.manager
    }

    /// Downloads or deletes one chapter.
    pub async fn handle(&self, req: &ChapterRequest) -> Result<RequestOutcome, RequestError> {
        let _master = self.master_lock.lock().await;
        let target = self.resolve(req.manga_id.as_deref(), req.chapter_id.as_deref())?;
        let chapter = target.chapter;

        if self.manager.active_download(&chapter).is_some() {
            return Err(if req.delete {
                UserError::CurrentlyDownloading
            } else {
                UserError::AlreadyDownloading
            }
            .into());
        }

        let downloaded = self.manager.is_chapter_downloaded(&chapter).await?;
        if !req.delete && downloaded {
            return Err(UserError::AlreadyDownloaded.into());
        }
        if req.delete && !downloaded {
            return Err(UserError::NotDownloaded.into());
        }

        if req.delete {
            let was_running = self.manager.is_running();
            if was_running {
                self.manager.destroy_subscriptions().await;
            }
            let deleted = self.manager.delete_chapter(&chapter).await;
            // Restart even if the delete failed; the pool state must not leak.
            if was_running {
                self.manager.start_downloads().await;
            }
            deleted?;
            return Ok(RequestOutcome::Deleted(chapter));
        }

        let report = self
            .manager
            .download_chapters(&target.source, &[chapter])
            .await;
        self.manager.start_downloads().await;
        match report.queued.first() {
            Some(job) => Ok(RequestOutcome::Queued(job.snapshot())),
            None => Err(UserError::AlreadyDownloading.into()),
        }
    }

    /// Whether the chapter is stored, and its active job if any.
    pub async fn status(
        &self,
        manga_id: Option<&str>,
        chapter_id: Option<&str>,
    ) -> Result<ChapterStatus, RequestError> {
        let target = self.resolve(manga_id, chapter_id)?;
        Ok(ChapterStatus {
            chapter: target.chapter,
            downloaded: self.manager.is_chapter_downloaded(&target.chapter).await?,
            active: self.manager.active_download(&target.chapter),
            source: target.source,
        })
    }

    fn resolve(&self, manga_id: Option<&str>, chapter_id: Option<&str>) -> Result<Target, RequestError> {
        let manga_id = parse_id(manga_id).ok_or(UserError::MissingMangaId)?;
        let chapter_id = parse_id(chapter_id).ok_or(UserError::MissingChapterId)?;

        let manga = self
            .library
            .manga(manga_id)
            .ok_or(UserError::MangaNotFound(manga_id))?;
        if !self.manager.sources().contains(&manga.source) {
            return Err(anyhow::anyhow!(
                "manga {} uses unknown source '{}'",
                manga.id,
                manga.source
            )
            .into());
        }
        let chapter = self
            .library
            .chapter(chapter_id)
            .ok_or(UserError::ChapterNotFound(chapter_id))?;
        if chapter.manga_id != manga.id {
            return Err(UserError::ChapterNotInManga {
                manga_id,
                chapter_id,
            }
            .into());
        }

        Ok(Target {
            chapter: chapter.chapter_ref(),
            source: manga.source,
        })
    }
}
