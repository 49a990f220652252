//! Logging init: append to a file under the XDG state dir, or stderr.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,cdm_core=debug,cdm=debug";

/// Where log output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    File(PathBuf),
    Stderr,
}

/// Writer for one log event: the shared log file, or stderr if the handle
/// could not be cloned.
enum EventWriter {
    File(fs::File),
    Stderr,
}

impl io::Write for EventWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            EventWriter::File(f) => f.write(buf),
            EventWriter::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            EventWriter::File(f) => f.flush(),
            EventWriter::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct SharedFile(fs::File);

impl<'a> MakeWriter<'a> for SharedFile {
    type Writer = EventWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(EventWriter::File)
            .unwrap_or(EventWriter::Stderr)
    }
}

/// `~/.local/state/cdm/cdm.log`, creating the directory if needed.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("cdm")?;
    Ok(xdg_dirs.place_state_file("cdm.log")?)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize structured logging. With `to_stderr`, or when the log file cannot
/// be opened, events go to stderr instead.
pub fn init_logging(to_stderr: bool) -> LogDestination {
    if !to_stderr {
        match open_log_file() {
            Ok((path, file)) => {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter())
                    .with_writer(BoxMakeWriter::new(SharedFile(file)))
                    .with_ansi(false)
                    .init();
                tracing::info!("cdm logging initialized at {}", path.display());
                return LogDestination::File(path);
            }
            Err(e) => {
                init_stderr();
                tracing::warn!("log file unavailable, logging to stderr: {:#}", e);
                return LogDestination::Stderr;
            }
        }
    }
    init_stderr();
    LogDestination::Stderr
}

fn open_log_file() -> Result<(PathBuf, fs::File)> {
    let path = log_file_path()?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    Ok((path, file))
}

fn init_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}
