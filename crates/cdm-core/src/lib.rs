//! Chapter download engine: queues per-chapter download jobs, runs them on a
//! worker pool against pluggable sources, and stores the pages on disk.

pub mod config;
pub mod logging;

pub mod active;
pub mod chapter;
pub mod control;
pub mod error;
pub mod job;
pub mod library;
pub mod manager;
pub mod queue;
pub mod request;
pub mod source;
pub mod storage;
mod worker;

pub use chapter::{ChapterId, ChapterRef, MangaId, SourceId};
pub use error::{ConsistencyError, DeleteError, FetchError, RequestError, UserError};
pub use job::{Job, JobHandle, JobId, JobStatus};
pub use manager::{DownloadManager, EnqueueReport};
pub use request::{ChapterRequest, ChapterRequestHandler, ChapterStatus, RequestOutcome};
