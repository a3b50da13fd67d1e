//! Local command execution with a hard timeout.
//!
//! Backs the `run_local_command` tool and the host-reachability check in
//! `diagnose_connection`. Commands run through `sh -c` in their own
//! process, never through a pane session, and are killed when the
//! timeout elapses.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

/// Errors from spawning a local command.
#[derive(Debug, Error)]
pub enum LocalExecError {
    /// The shell process could not be started.
    #[error("failed to start local command: {source}")]
    SpawnError {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Output of a completed (or timed-out) local command.
#[derive(Debug, Clone)]
pub struct LocalOutput {
    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// Exit code; -1 when the process was killed on timeout.
    pub exit_code: i32,

    /// Whether the command exited zero within the timeout.
    pub success: bool,

    /// Whether the timeout elapsed before the command finished.
    pub timed_out: bool,
}

/// Runs `command` via `sh -c`, waiting at most `timeout`.
///
/// On timeout the child is killed and whatever output it produced so far
/// is returned with `timed_out` set.
///
/// # Errors
///
/// Returns an error only when the shell itself cannot be spawned.
pub fn run(command: &str, timeout: Duration) -> Result<LocalOutput, LocalExecError> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| LocalExecError::SpawnError { source })?;

    let (exit_code, timed_out) = match child
        .wait_timeout(timeout)
        .map_err(|source| LocalExecError::SpawnError { source })?
    {
        Some(status) => (status.code().unwrap_or(-1), false),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            (-1, true)
        }
    };

    let mut stdout = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        let _ = pipe.read_to_string(&mut stdout);
    }
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr);
    }

    Ok(LocalOutput {
        stdout,
        stderr,
        exit_code,
        success: exit_code == 0 && !timed_out,
        timed_out,
    })
}
