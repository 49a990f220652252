//! Control socket: server (during `cdm run`) and client (every other command).
//! Protocol: one request line in, one JSON reply line out (see `cdm_core::control`).

use anyhow::{Context, Result};
use cdm_core::control;
use cdm_core::ChapterRequestHandler;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Binds `path` (replacing a stale socket) and spawns a task that answers each
/// request line with the handler's reply.
pub fn spawn_control_listener(
    handler: Arc<ChapterRequestHandler>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("failed to bind control socket {}", path.display()))?;
    tracing::debug!(path = %path.display(), "control socket listening");

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let handler = Arc::clone(&handler);
                    tokio::spawn(serve_connection(handler, stream));
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(handler: Arc<ChapterRequestHandler>, stream: UnixStream) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let reply = control::dispatch(&handler, &line).await;
        let mut out = reply.to_string();
        out.push('\n');
        if let Err(e) = write.write_all(out.as_bytes()).await {
            tracing::debug!("control socket write: {}", e);
            return;
        }
    }
}

/// Sends one request line and returns the parsed reply.
pub async fn send_request(socket_path: &Path, line: &str) -> Result<Value> {
    if !socket_path.exists() {
        anyhow::bail!(
            "no control socket at {}; is `cdm run` active?",
            socket_path.display()
        );
    }
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("failed to connect to {}", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    write.write_all(format!("{}\n", line).as_bytes()).await?;
    write.shutdown().await?;

    let reply = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .context("control socket closed without a reply")?;
    serde_json::from_str(&reply).context("malformed control reply")
}
