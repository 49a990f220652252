//! Manga catalog lookups.
//!
//! The engine only needs to turn catalog ids into records (which source a manga
//! comes from, which manga a chapter belongs to). `JsonLibrary` is a read-only
//! catalog loaded from a JSON file:
//!
//! ```json
//! { "manga": [{ "id": 1, "title": "...", "source": "mirror" }],
//!   "chapters": [{ "id": 10, "manga_id": 1, "name": "Chapter 1" }] }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::chapter::{ChapterId, ChapterRef, MangaId, SourceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manga {
    pub id: MangaId,
    pub title: String,
    pub source: SourceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub manga_id: MangaId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<f64>,
}

impl Chapter {
    pub fn chapter_ref(&self) -> ChapterRef {
        ChapterRef::new(self.manga_id, self.id)
    }
}

pub trait Library: Send + Sync {
    fn manga(&self, id: MangaId) -> Option<Manga>;
    fn chapter(&self, id: ChapterId) -> Option<Chapter>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    manga: Vec<Manga>,
    #[serde(default)]
    chapters: Vec<Chapter>,
}

#[derive(Debug, Default, Clone)]
pub struct JsonLibrary {
    manga: HashMap<MangaId, Manga>,
    chapters: HashMap<ChapterId, Chapter>,
}

impl JsonLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let lib = Self::from_json(&data)
            .with_context(|| format!("invalid catalog {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            manga = lib.manga.len(),
            chapters = lib.chapters.len(),
            "loaded catalog"
        );
        Ok(lib)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(data)?;
        Self::from_parts(file.manga, file.chapters)
    }

    /// Fails on duplicate ids or chapters whose manga is missing.
    pub fn from_parts(manga: Vec<Manga>, chapters: Vec<Chapter>) -> Result<Self> {
        let mut lib = Self::default();
        for m in manga {
            let id = m.id;
            if lib.manga.insert(id, m).is_some() {
                anyhow::bail!("duplicate manga id {}", id);
            }
        }
        for c in chapters {
            if !lib.manga.contains_key(&c.manga_id) {
                anyhow::bail!("chapter {} refers to unknown manga {}", c.id, c.manga_id);
            }
            let id = c.id;
            if lib.chapters.insert(id, c).is_some() {
                anyhow::bail!("duplicate chapter id {}", id);
            }
        }
        Ok(lib)
    }
}

impl Library for JsonLibrary {
    fn manga(&self, id: MangaId) -> Option<Manga> {
        self.manga.get(&id).cloned()
    }

    fn chapter(&self, id: ChapterId) -> Option<Chapter> {
        self.chapters.get(&id).cloned()
    }
}
