use std::process::Stdio;
use tokio::process::Command;

/// Runs `<command> <flag>` and reports whether it started and exited cleanly.
pub async fn probe_version(command: &str, flag: &str) -> bool {
    match Command::new(command)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::warn!("{} is not available: {}", command, e);
            false
        }
    }
}
