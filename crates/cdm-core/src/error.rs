//! Error taxonomy for chapter requests and downloads.
//!
//! - [`UserError`]: the request is invalid or conflicts with current state. Never retried.
//! - [`FetchError`]: a source could not deliver a chapter. Local to one job.
//! - [`ConsistencyError`]: a destructive operation raced an active job. Caller retries later.

use thiserror::Error;

use crate::chapter::{ChapterId, ChapterRef, MangaId, SourceId};
use crate::job::JobStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("manga id must be specified")]
    MissingMangaId,
    #[error("chapter id must be specified")]
    MissingChapterId,
    #[error("the specified manga does not exist")]
    MangaNotFound(MangaId),
    #[error("the specified chapter does not exist")]
    ChapterNotFound(ChapterId),
    #[error("chapter {chapter_id} does not belong to manga {manga_id}")]
    ChapterNotInManga {
        manga_id: MangaId,
        chapter_id: ChapterId,
    },
    #[error("this chapter is currently being downloaded")]
    CurrentlyDownloading,
    #[error("this chapter is already being downloaded")]
    AlreadyDownloading,
    #[error("this chapter is already downloaded")]
    AlreadyDownloaded,
    #[error("this chapter is not downloaded")]
    NotDownloaded,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source unreachable: {0}")]
    Unreachable(String),
    #[error("HTTP {0}")]
    Http(u32),
    #[error("malformed chapter content: {0}")]
    Malformed(String),
    #[error("fetch cancelled")]
    Cancelled,
    #[error("no source registered as '{0}'")]
    UnknownSource(SourceId),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A chapter still has a queued or running job.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("chapter {chapter} has an active download job ({status})")]
pub struct ConsistencyError {
    pub chapter: ChapterRef,
    pub status: JobStatus,
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error(transparent)]
    Active(#[from] ConsistencyError),
    #[error("could not delete chapter content")]
    Storage(#[source] anyhow::Error),
}

/// Everything a chapter request can fail with.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<DeleteError> for RequestError {
    fn from(e: DeleteError) -> Self {
        match e {
            DeleteError::Active(c) => RequestError::Consistency(c),
            DeleteError::Storage(e) => RequestError::Internal(e.context("could not delete chapter content")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_messages_are_descriptive() {
        assert_eq!(
            UserError::AlreadyDownloading.to_string(),
            "this chapter is already being downloaded"
        );
        assert_eq!(
            UserError::MangaNotFound(4).to_string(),
            "the specified manga does not exist"
        );
    }

    #[test]
    fn consistency_error_names_chapter_and_status() {
        let e = ConsistencyError {
            chapter: ChapterRef::new(2, 5),
            status: JobStatus::Running,
        };
        assert_eq!(e.to_string(), "chapter 2/5 has an active download job (running)");
    }

    #[test]
    fn delete_error_maps_into_request_error() {
        let e = DeleteError::Active(ConsistencyError {
            chapter: ChapterRef::new(1, 1),
            status: JobStatus::Queued,
        });
        assert!(matches!(RequestError::from(e), RequestError::Consistency(_)));
        let e = DeleteError::Storage(anyhow::anyhow!("permission denied"));
        assert!(matches!(RequestError::from(e), RequestError::Internal(_)));
    }
}
