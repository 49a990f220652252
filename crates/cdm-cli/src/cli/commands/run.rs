//! `cdm run` – serve chapter requests until Ctrl-C.

use anyhow::{Context, Result};
use cdm_core::config::CdmConfig;
use cdm_core::control;
use cdm_core::library::JsonLibrary;
use cdm_core::logging::LogDestination;
use cdm_core::{ChapterRequestHandler, DownloadManager};
use std::sync::Arc;

use crate::cli::control_socket;

pub async fn run_daemon(
    mut cfg: CdmConfig,
    workers: Option<usize>,
    log: &LogDestination,
) -> Result<()> {
    if let Some(n) = workers {
        cfg.workers = n;
    }

    let library_path = cfg.resolve_library_path()?;
    let library = JsonLibrary::load(&library_path)?;
    let manager = Arc::new(DownloadManager::from_config(&cfg)?);
    let sources = manager.sources().ids();
    if sources.is_empty() {
        tracing::warn!("no sources configured; every download will fail");
    } else {
        tracing::info!(?sources, "sources registered");
    }

    let handler = Arc::new(ChapterRequestHandler::new(
        Arc::clone(&manager),
        Arc::new(library),
    ));
    let socket_path = control::default_control_socket_path()?;
    let listener = control_socket::spawn_control_listener(handler, &socket_path)?;

    println!(
        "cdm running ({} worker(s)); control socket at {}",
        manager.workers(),
        socket_path.display()
    );
    if let LogDestination::File(path) = log {
        println!("logging to {}", path.display());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("shutdown requested");

    listener.abort();
    manager.destroy_subscriptions().await;
    let _ = std::fs::remove_file(&socket_path);
    println!("Stopped.");
    Ok(())
}
