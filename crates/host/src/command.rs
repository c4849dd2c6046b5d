//! Running host tools
//!
//! Arguments are always passed as separate argv entries; nothing here goes
//! through a shell.

use std::io::ErrorKind;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use warden_core::{Error, Result};

/// Default bound for a single host tool invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `program args...` to completion, collecting output.
///
/// A missing binary is reported as `Unavailable`; a non-zero exit is *not* an
/// error here, callers inspect `status` themselves.
pub async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<Output> {
    tracing::debug!(program, ?args, "running host command");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(Error::command_execution(
            program,
            format!("failed to collect output: {e}"),
            None,
        )),
        Err(_) => Err(Error::timeout(format!("{program} {}", args.join(" ")), timeout)),
    }
}

/// Like [`run`], but a non-zero exit becomes a `CommandExecution` error
/// carrying stderr.
pub async fn run_checked(program: &str, args: &[&str], timeout: Duration) -> Result<Output> {
    let output = run(program, args, timeout).await?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(Error::command_execution(
            program,
            stderr_text(&output),
            output.status.code(),
        ))
    }
}

pub fn spawn_error(program: &str, e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::unavailable(program, format!("'{program}' is not installed"))
    } else {
        Error::command_execution(program, format!("failed to spawn: {e}"), None)
    }
}

pub fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
