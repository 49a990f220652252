//! `cdm jobs` – list queued and running jobs.

use anyhow::Result;
use cdm_core::control::ControlRequest;
use cdm_core::Job;

pub async fn run_jobs() -> Result<()> {
    let reply = super::request(&ControlRequest::Jobs).await?;
    let running = reply["running"].as_bool().unwrap_or(false);
    let jobs: Vec<Job> = serde_json::from_value(reply["jobs"].clone())?;

    println!("Pool: {}", if running { "running" } else { "stopped" });
    if jobs.is_empty() {
        println!("No active jobs.");
        return Ok(());
    }
    println!("{:<6} {:<10} {:<12} {}", "ID", "STATE", "CHAPTER", "SOURCE");
    for j in jobs {
        println!(
            "{:<6} {:<10} {:<12} {}",
            j.id,
            j.status.as_str(),
            j.chapter.to_string(),
            j.source
        );
    }
    Ok(())
}
