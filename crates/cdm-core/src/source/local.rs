//! Source backed by a local mirror laid out as `<root>/<manga>/<chapter>/<page files>`.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::{ChapterContent, ChapterSource};
use crate::chapter::{ChapterRef, SourceId};
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct LocalSource {
    id: SourceId,
    root: PathBuf,
}

impl LocalSource {
    pub fn new(id: SourceId, root: PathBuf) -> Self {
        Self { id, root }
    }

    pub fn chapter_dir(&self, chapter: &ChapterRef) -> PathBuf {
        self.root
            .join(chapter.manga_id.to_string())
            .join(chapter.chapter_id.to_string())
    }
}

#[async_trait]
impl ChapterSource for LocalSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn fetch(
        &self,
        chapter: &ChapterRef,
        cancel: &CancellationToken,
    ) -> Result<ChapterContent, FetchError> {
        let dir = self.chapter_dir(chapter);
        let pages = list_pages(&dir).await?;
        if pages.is_empty() {
            return Err(FetchError::Malformed(format!(
                "no pages in {}",
                dir.display()
            )));
        }

        let mut content = Vec::with_capacity(pages.len());
        for page in pages {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            let data = tokio::fs::read(&page).await?;
            content.push(Bytes::from(data));
        }
        tracing::debug!(source = %self.id, %chapter, pages = content.len(), "read local chapter");
        Ok(ChapterContent::new(content))
    }
}

/// Regular, non-hidden files of `dir`, sorted by name.
async fn list_pages(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FetchError::Unreachable(format!(
                "{} does not exist",
                dir.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let mut pages = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type().await?.is_file() {
            pages.push(entry.path());
        }
    }
    pages.sort();
    Ok(pages)
}
