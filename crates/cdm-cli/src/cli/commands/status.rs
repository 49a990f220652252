//! `cdm status <manga> <chapter>` – show one chapter's download state.

use anyhow::Result;
use cdm_core::control::ControlRequest;
use cdm_core::Job;

pub async fn run_status(manga_id: String, chapter_id: String) -> Result<()> {
    let reply = super::request(&ControlRequest::Status {
        manga_id: Some(manga_id),
        chapter_id: Some(chapter_id),
    })
    .await?;
    let status = &reply["status"];

    let chapter = &status["chapter"];
    let downloaded = status["downloaded"].as_bool().unwrap_or(false);
    println!(
        "chapter {}/{} (source {}): {}",
        chapter["manga_id"],
        chapter["chapter_id"],
        status["source"].as_str().unwrap_or("?"),
        if downloaded { "downloaded" } else { "not downloaded" }
    );
    if !status["active"].is_null() {
        let job: Job = serde_json::from_value(status["active"].clone())?;
        println!("  job {} {}", job.id, job.status);
    }
    Ok(())
}
