//! `cdm download <manga> <chapter> [--delete]` – queue or delete one chapter.

use anyhow::Result;
use cdm_core::control::ControlRequest;
use cdm_core::{ChapterRequest, Job};

pub async fn run_download(manga_id: String, chapter_id: String, delete: bool) -> Result<()> {
    let req = ChapterRequest {
        manga_id: Some(manga_id),
        chapter_id: Some(chapter_id),
        delete,
    };
    let reply = super::request(&ControlRequest::Chapter(req.clone())).await?;

    if delete {
        println!(
            "Deleted chapter {} of manga {}",
            req.chapter_id.unwrap_or_default(),
            req.manga_id.unwrap_or_default()
        );
    } else {
        let job: Job = serde_json::from_value(reply["job"].clone())?;
        println!("Queued chapter {} (job {})", job.chapter, job.id);
    }
    Ok(())
}
