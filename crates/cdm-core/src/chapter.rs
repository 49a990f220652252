//! Chapter and source identities shared by every layer of the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog identifier of a manga (work).
pub type MangaId = i64;

/// Catalog identifier of a chapter.
pub type ChapterId = i64;

/// Identity of one chapter within one cataloged manga.
///
/// Key for active-download lookups and for storage queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChapterRef {
    pub manga_id: MangaId,
    pub chapter_id: ChapterId,
}

impl ChapterRef {
    pub const fn new(manga_id: MangaId, chapter_id: ChapterId) -> Self {
        Self {
            manga_id,
            chapter_id,
        }
    }
}

impl fmt::Display for ChapterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.manga_id, self.chapter_id)
    }
}

/// Identifier of a content source (the key in `[sources.<id>]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
