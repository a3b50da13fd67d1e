//! tmux-backed pane manager.
//!
//! Each operation is one short-lived `tmux` invocation; nothing here
//! holds state between calls. The binary is located once at construction
//! so that a missing tmux surfaces as a clear error instead of a spawn
//! failure deep inside a connect sequence.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::trace;

use crate::error::PaneError;
use crate::pane::PaneManager;

/// Drives the `tmux` binary through its CLI.
#[derive(Debug, Clone)]
pub struct TmuxPaneManager {
    tmux: PathBuf,
}

impl TmuxPaneManager {
    /// Locates tmux on PATH.
    ///
    /// # Errors
    ///
    /// Returns [`PaneError::MultiplexerNotFound`] when tmux is not
    /// installed.
    pub fn discover() -> Result<Self, PaneError> {
        let tmux = which::which("tmux").map_err(|_| PaneError::MultiplexerNotFound {
            name: "tmux".to_string(),
        })?;
        Ok(Self { tmux })
    }

    /// Uses an explicit tmux binary path (tests, unusual installs).
    #[must_use]
    pub fn with_binary(tmux: PathBuf) -> Self {
        Self { tmux }
    }

    fn run(&self, subcommand: &str, args: &[&str], session: &str) -> Result<std::process::Output, PaneError> {
        trace!(subcommand, session, "tmux invocation");
        Command::new(&self.tmux)
            .arg(subcommand)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| PaneError::SpawnError {
                command: format!("tmux {subcommand}"),
                source,
            })
    }
}

impl PaneManager for TmuxPaneManager {
    fn exists(&self, session: &str) -> Result<bool, PaneError> {
        // Nonzero covers both "no such session" and "no server running"
        let output = self.run("has-session", &["-t", session], session)?;
        Ok(output.status.success())
    }

    fn create(&self, session: &str, initial_command: Option<&str>) -> Result<(), PaneError> {
        let mut args = vec!["-d", "-s", session];
        if let Some(cmd) = initial_command {
            args.push(cmd);
        }
        let output = self.run("new-session", &args, session)?;
        if !output.status.success() {
            return Err(PaneError::CommandFailed {
                command: "new-session".to_string(),
                session: session.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn kill(&self, session: &str) -> Result<(), PaneError> {
        // Idempotent: a failure here means the session was already gone
        let _ = self.run("kill-session", &["-t", session], session)?;
        Ok(())
    }

    fn send_keys(&self, session: &str, text: &str, press_enter: bool) -> Result<(), PaneError> {
        let mut args = vec!["-t", session, text];
        if press_enter {
            args.push("C-m");
        }
        let output = self.run("send-keys", &args, session)?;
        if !output.status.success() {
            return Err(PaneError::CommandFailed {
                command: "send-keys".to_string(),
                session: session.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn capture(&self, session: &str, tail_lines: usize) -> Result<String, PaneError> {
        let start = format!("-{tail_lines}");
        let output = self.run("capture-pane", &["-t", session, "-p", "-S", &start], session)?;
        if !output.status.success() {
            return Err(PaneError::CommandFailed {
                command: "capture-pane".to_string(),
                session: session.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        // tmux may hand back more history than asked for; keep the tail
        let lines: Vec<&str> = text.lines().collect();
        let keep = lines.len().saturating_sub(tail_lines);
        Ok(lines[keep..].join("\n"))
    }

    fn list(&self) -> Result<Vec<String>, PaneError> {
        let output = self.run("list-sessions", &["-F", "#{session_name}"], "")?;
        if !output.status.success() {
            // "no server running" is an empty list, not an error
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .filter(|l| !l.is_empty())
            .collect())
    }
}
