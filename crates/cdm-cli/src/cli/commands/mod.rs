//! CLI command handlers, one file per command.

mod download;
mod jobs;
mod run;
mod status;

pub use download::run_download;
pub use jobs::run_jobs;
pub use run::run_daemon;
pub use status::run_status;

use anyhow::Result;
use cdm_core::control::{self, ControlRequest};
use serde_json::Value;

use crate::cli::control_socket;

/// Sends `request` to the running manager. Fails with the reply's error
/// message when the manager rejects it.
async fn request(request: &ControlRequest) -> Result<Value> {
    let path = control::default_control_socket_path()?;
    let reply = control_socket::send_request(&path, &request.to_line()).await?;
    if reply["success"] != Value::Bool(true) {
        let message = reply["error"].as_str().unwrap_or("request failed");
        anyhow::bail!("{}", message);
    }
    Ok(reply)
}
