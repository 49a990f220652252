//! CLI for the CDM chapter download manager.

mod commands;
mod control_socket;

use anyhow::Result;
use cdm_core::config;
use cdm_core::logging::LogDestination;
use clap::{Parser, Subcommand};

use commands::{run_daemon, run_download, run_jobs, run_status};

/// Top-level CLI for the CDM chapter download manager.
#[derive(Debug, Parser)]
#[command(name = "cdm")]
#[command(about = "CDM: queue and download manga chapters", long_about = None)]
pub struct Cli {
    /// Log to stderr instead of the state-dir log file.
    #[arg(long, global = true)]
    pub log_stderr: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the download manager and serve the control socket until Ctrl-C.
    Run {
        /// Download up to N chapters concurrently (overrides `workers` in config.toml).
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
    },

    /// Queue a chapter download, or delete a downloaded chapter.
    Download {
        /// Manga id in the catalog.
        manga_id: String,
        /// Chapter id in the catalog.
        chapter_id: String,
        /// Delete the stored chapter instead of downloading it.
        #[arg(long)]
        delete: bool,
    },

    /// Show whether a chapter is downloaded and its active job, if any.
    Status {
        manga_id: String,
        chapter_id: String,
    },

    /// List queued and running jobs.
    Jobs,
}

impl Cli {
    pub async fn run(self, log: LogDestination) -> Result<()> {
        match self.command {
            CliCommand::Run { workers } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_daemon(cfg, workers, &log).await?;
            }
            CliCommand::Download {
                manga_id,
                chapter_id,
                delete,
            } => run_download(manga_id, chapter_id, delete).await?,
            CliCommand::Status {
                manga_id,
                chapter_id,
            } => run_status(manga_id, chapter_id).await?,
            CliCommand::Jobs => run_jobs().await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
