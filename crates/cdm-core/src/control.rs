//! Control protocol between `cdm run` and its clients.
//!
//! One request per line, one JSON reply per line:
//!
//! ```text
//! download <manga> <chapter>   -> {"success":true,"job":{...}}
//! delete <manga> <chapter>     -> {"success":true}
//! status <manga> <chapter>     -> {"success":true,"status":{...}}
//! jobs                         -> {"success":true,"running":true,"jobs":[...]}
//! ```
//!
//! Failures reply `{"success":false,"error":"<message>"}`.

use anyhow::Result;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::error::RequestError;
use crate::request::{ChapterRequest, ChapterRequestHandler, RequestOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Chapter(ChapterRequest),
    Status {
        manga_id: Option<String>,
        chapter_id: Option<String>,
    },
    Jobs,
}

impl ControlRequest {
    /// Parses one request line. Missing ids are kept as `None` so the handler
    /// can report which one is missing.
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let command = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty request"))?;
        let manga_id = parts.next().map(str::to_string);
        let chapter_id = parts.next().map(str::to_string);
        if parts.next().is_some() {
            anyhow::bail!("too many arguments for '{}'", command);
        }

        match command {
            "download" | "delete" => Ok(ControlRequest::Chapter(ChapterRequest {
                manga_id,
                chapter_id,
                delete: command == "delete",
            })),
            "status" => Ok(ControlRequest::Status {
                manga_id,
                chapter_id,
            }),
            "jobs" if manga_id.is_none() => Ok(ControlRequest::Jobs),
            "jobs" => anyhow::bail!("'jobs' takes no arguments"),
            other => anyhow::bail!("unknown command '{}'", other),
        }
    }

    pub fn to_line(&self) -> String {
        fn ids(m: &Option<String>, c: &Option<String>) -> String {
            [m, c]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        }
        match self {
            ControlRequest::Chapter(req) => {
                let command = if req.delete { "delete" } else { "download" };
                format!("{} {}", command, ids(&req.manga_id, &req.chapter_id))
                    .trim_end()
                    .to_string()
            }
            ControlRequest::Status {
                manga_id,
                chapter_id,
            } => format!("status {}", ids(manga_id, chapter_id))
                .trim_end()
                .to_string(),
            ControlRequest::Jobs => "jobs".to_string(),
        }
    }
}

/// `{"success":false,"error":...}`.
pub fn error_reply(message: impl std::fmt::Display) -> Value {
    json!({ "success": false, "error": message.to_string() })
}

fn request_error_reply(e: &RequestError) -> Value {
    match e {
        RequestError::Internal(inner) => {
            tracing::warn!("chapter request failed: {:#}", inner);
            error_reply(format!("{:#}", inner))
        }
        other => error_reply(other),
    }
}

/// Runs one request line against the handler and builds the reply.
pub async fn dispatch(handler: &ChapterRequestHandler, line: &str) -> Value {
    let request = match ControlRequest::parse(line) {
        Ok(request) => request,
        Err(e) => return error_reply(e),
    };
    tracing::debug!(request = %request.to_line(), "control request");

    match request {
        ControlRequest::Chapter(req) => match handler.handle(&req).await {
            Ok(RequestOutcome::Queued(job)) => json!({ "success": true, "job": job }),
            Ok(RequestOutcome::Deleted(_)) => json!({ "success": true }),
            Err(e) => request_error_reply(&e),
        },
        ControlRequest::Status {
            manga_id,
            chapter_id,
        } => match handler
            .status(manga_id.as_deref(), chapter_id.as_deref())
            .await
        {
            Ok(status) => json!({ "success": true, "status": status }),
            Err(e) => request_error_reply(&e),
        },
        ControlRequest::Jobs => {
            let manager = handler.manager();
            json!({
                "success": true,
                "running": manager.is_running(),
                "jobs": manager.active_downloads(),
            })
        }
    }
}

/// Default path for the control socket (XDG runtime or state dir).
pub fn default_control_socket_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("cdm")?;
    Ok(xdg_dirs.place_state_file("control.sock")?)
}
