//! Downloaded chapter content on disk.
//!
//! Layout: `<root>/<manga>/<chapter>/NNNN.<ext>`, one file per page. A chapter is
//! written into `<chapter>.part` and renamed into place only once every page is
//! on disk, so a failed or interrupted write never leaves a visible chapter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::chapter::ChapterRef;
use crate::source::ChapterContent;

/// Temporary directory suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Where the previous copy of a chapter waits while a new one is moved in.
pub const BACKUP_SUFFIX: &str = ".old";

/// Persistent chapter content, keyed by chapter.
#[async_trait]
pub trait ChapterStore: Send + Sync {
    async fn exists(&self, chapter: &ChapterRef) -> Result<bool>;

    /// Stores the chapter all-or-nothing, replacing any previous copy.
    async fn write(&self, chapter: &ChapterRef, content: &ChapterContent) -> Result<()>;

    /// Removes the chapter. Removing an absent chapter is not an error.
    async fn delete(&self, chapter: &ChapterRef) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FsChapterStore {
    root: PathBuf,
}

impl FsChapterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn chapter_dir(&self, chapter: &ChapterRef) -> PathBuf {
        self.root
            .join(chapter.manga_id.to_string())
            .join(chapter.chapter_id.to_string())
    }

    async fn write_pages(dir: &Path, content: &ChapterContent) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        for (i, page) in content.pages.iter().enumerate() {
            let name = format!("{:04}.{}", i + 1, page_extension(page));
            let path = dir.join(name);
            tokio::fs::write(&path, page)
                .await
                .with_context(|| format!("failed to write page {}", path.display()))?;
        }
        Ok(())
    }

    /// Moves a finished `.part` directory into place. A previous copy is moved
    /// aside first and restored if the final rename fails.
    async fn swap_in(temp_dir: &Path, final_dir: &Path) -> Result<()> {
        let backup = backup_path(final_dir);
        remove_dir_if_present(&backup).await?;
        let had_previous = match tokio::fs::rename(final_dir, &backup).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to move aside {}", final_dir.display()))
            }
        };

        if let Err(e) = tokio::fs::rename(temp_dir, final_dir).await {
            if had_previous {
                if let Err(restore) = tokio::fs::rename(&backup, final_dir).await {
                    tracing::warn!(path = %final_dir.display(), "could not restore previous chapter: {}", restore);
                }
            }
            return Err(e).with_context(|| {
                format!(
                    "failed to rename {} to {}",
                    temp_dir.display(),
                    final_dir.display()
                )
            });
        }

        if had_previous {
            remove_dir_if_present(&backup).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChapterStore for FsChapterStore {
    async fn exists(&self, chapter: &ChapterRef) -> Result<bool> {
        let dir = self.chapter_dir(chapter);
        tokio::fs::try_exists(&dir)
            .await
            .with_context(|| format!("failed to stat {}", dir.display()))
    }

    async fn write(&self, chapter: &ChapterRef, content: &ChapterContent) -> Result<()> {
        let final_dir = self.chapter_dir(chapter);
        let temp_dir = temp_path(&final_dir);

        remove_dir_if_present(&temp_dir).await?;
        if let Err(e) = Self::write_pages(&temp_dir, content).await {
            if let Err(cleanup) = remove_dir_if_present(&temp_dir).await {
                tracing::warn!(path = %temp_dir.display(), "could not clean up partial chapter: {:#}", cleanup);
            }
            return Err(e);
        }

        Self::swap_in(&temp_dir, &final_dir).await?;
        tracing::debug!(
            %chapter,
            pages = content.pages.len(),
            bytes = content.total_bytes(),
            path = %final_dir.display(),
            "stored chapter"
        );
        Ok(())
    }

    async fn delete(&self, chapter: &ChapterRef) -> Result<()> {
        let final_dir = self.chapter_dir(chapter);
        remove_dir_if_present(&final_dir).await?;
        remove_dir_if_present(&temp_path(&final_dir)).await?;
        remove_dir_if_present(&backup_path(&final_dir)).await?;

        // Drop the manga directory once its last chapter is gone.
        if let Some(manga_dir) = final_dir.parent() {
            match tokio::fs::remove_dir(manga_dir).await {
                Ok(()) => {}
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::DirectoryNotEmpty) => {}
                Err(e) => {
                    tracing::debug!(path = %manga_dir.display(), "could not remove manga directory: {}", e);
                }
            }
        }
        tracing::debug!(%chapter, "deleted chapter");
        Ok(())
    }
}

/// Path for the temp directory: appends `.part` (e.g. `12/7` -> `12/7.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    with_suffix(final_path, TEMP_SUFFIX)
}

/// Path for the previous copy during a replace (e.g. `12/7` -> `12/7.old`).
pub fn backup_path(final_path: &Path) -> PathBuf {
    with_suffix(final_path, BACKUP_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut o = path.as_os_str().to_owned();
    o.push(suffix);
    PathBuf::from(o)
}

async fn remove_dir_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// File extension for a page, from its magic bytes.
fn page_extension(data: &[u8]) -> &'static str {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => "jpg",
        [0x89, b'P', b'N', b'G', ..] => "png",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        [b'P', b'K', 0x03, 0x04, ..] => "cbz",
        _ => "bin",
    }
}
