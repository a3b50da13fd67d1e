//! Command execution through a pane session.
//!
//! A pane is a screen, not a pipe: there is no exit status and no stream
//! position. [`PaneDriver`] recovers both with a sentinel-echo protocol:
//! every non-interactive command is sent as
//! `cmd ; echo <sentinel>_$?` and the capture is polled until the
//! sentinel shows up. The sentinel carries a sequence number so stale
//! markers from earlier commands in the same scrollback never match.
//!
//! Interactive steps (ssh logins, `docker exec`, `exec zsh`) bypass the
//! sentinel and are driven by the caller polling the readiness detector.

use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, trace};

use crate::connect::readiness;
use crate::error::PaneError;
use crate::pane::{PaneManager, DEFAULT_TAIL_LINES};

/// Base64 payload characters sent per `echo` line during uploads.
const UPLOAD_CHUNK_CHARS: usize = 800;

/// Result of one sentinel-tracked pane command.
#[derive(Debug, Clone)]
pub struct PaneCommandResult {
    /// Capture tail at completion, sentinel line removed.
    pub output: String,

    /// Exit status parsed from the sentinel; -1 when unparsable.
    pub exit_code: i32,
}

impl PaneCommandResult {
    /// Whether the remote command exited zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Outcome of waiting on a pane condition.
#[derive(Debug, Clone)]
pub enum WaitOutcome {
    /// Condition matched; carries the capture tail at match time.
    Ready(String),
    /// A fatal phrase appeared; carries the phrase and the tail.
    Fatal(&'static str, String),
    /// The deadline passed; carries the last capture tail.
    TimedOut(String),
}

/// Drives commands and transfers through a pane session.
pub struct PaneDriver {
    pane: Arc<dyn PaneManager>,
    poll_interval: Duration,
    seq: Cell<u64>,
}

impl PaneDriver {
    /// Wraps a pane manager with the given polling interval.
    #[must_use]
    pub fn new(pane: Arc<dyn PaneManager>, poll_interval: Duration) -> Self {
        Self {
            pane,
            poll_interval,
            seq: Cell::new(0),
        }
    }

    /// The wrapped pane manager.
    #[must_use]
    pub fn pane(&self) -> &dyn PaneManager {
        self.pane.as_ref()
    }

    /// Polling interval used between captures.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Sends one line of input followed by Enter.
    ///
    /// # Errors
    ///
    /// Propagates pane delivery failures.
    pub fn send_line(&self, session: &str, text: &str) -> Result<(), PaneError> {
        self.pane.send_keys(session, text, true)
    }

    /// Captures the last 40 lines of the session.
    ///
    /// # Errors
    ///
    /// Propagates capture failures.
    pub fn capture_tail(&self, session: &str) -> Result<String, PaneError> {
        self.pane.capture(session, DEFAULT_TAIL_LINES)
    }

    /// Polls the capture until `condition` matches, a fatal phrase
    /// appears, or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Propagates capture failures.
    pub fn wait_for(
        &self,
        session: &str,
        timeout: Duration,
        condition: impl Fn(&str) -> bool,
    ) -> Result<WaitOutcome, PaneError> {
        let deadline = Instant::now() + timeout;
        loop {
            let tail = self.capture_tail(session)?;
            if let Some(phrase) = readiness::fatal_error(&tail) {
                return Ok(WaitOutcome::Fatal(phrase, tail));
            }
            if condition(&tail) {
                return Ok(WaitOutcome::Ready(tail));
            }
            if Instant::now() >= deadline {
                return Ok(WaitOutcome::TimedOut(tail));
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Runs a non-interactive command in the pane and waits for its
    /// sentinel, returning output and exit status.
    ///
    /// # Errors
    ///
    /// Propagates pane failures; a timeout is reported as exit code -1
    /// with whatever output was captured.
    pub fn run_command(
        &self,
        session: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<PaneCommandResult, PaneError> {
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        let marker = format!("__RT_{seq}_DONE_");

        trace!(session, command, "pane command");
        self.send_line(session, &format!("{command} ; echo {marker}$?"))?;

        let marker_for_match = marker.clone();
        let outcome = self.wait_for(session, timeout, move |tail| {
            // The echoed command line also contains the marker text; only
            // a line that IS the marker (plus status) counts.
            tail.lines()
                .any(|l| l.trim_end().starts_with(&marker_for_match) && !l.contains("echo"))
        });

        match outcome? {
            WaitOutcome::Ready(tail) => {
                let exit_code = tail
                    .lines()
                    .rev()
                    .find_map(|l| {
                        let l = l.trim_end();
                        l.starts_with(&marker)
                            .then(|| l[marker.len()..].parse::<i32>().ok())
                            .flatten()
                    })
                    .unwrap_or(-1);
                let output = tail
                    .lines()
                    .filter(|l| !l.contains(&marker))
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(PaneCommandResult { output, exit_code })
            }
            WaitOutcome::Fatal(_, tail) | WaitOutcome::TimedOut(tail) => {
                debug!(session, command, "pane command did not complete");
                Ok(PaneCommandResult {
                    output: tail,
                    exit_code: -1,
                })
            }
        }
    }

    /// Transfers `bytes` into the session's filesystem at `remote_path`
    /// using base64-chunked appends, so no outbound network is needed on
    /// the remote side.
    ///
    /// # Errors
    ///
    /// Propagates pane failures; returns the decode step's result so the
    /// caller can verify success.
    pub fn upload(
        &self,
        session: &str,
        bytes: &[u8],
        remote_path: &str,
        timeout: Duration,
    ) -> Result<PaneCommandResult, PaneError> {
        let staging = format!("{remote_path}.b64");
        let encoded = BASE64.encode(bytes);
        debug!(session, remote_path, bytes = bytes.len(), "pane upload");

        // touch covers the zero-byte case where no chunk is appended
        self.run_command(
            session,
            &format!("rm -f '{staging}' '{remote_path}' && touch '{staging}'"),
            timeout,
        )?;

        let chars: Vec<char> = encoded.chars().collect();
        for chunk in chars.chunks(UPLOAD_CHUNK_CHARS) {
            let part: String = chunk.iter().collect();
            // Base64 alphabet never contains quotes, so single-quoting is safe
            self.send_line(session, &format!("echo '{part}' >> '{staging}'"))?;
        }

        self.run_command(
            session,
            &format!("base64 -d '{staging}' > '{remote_path}' && rm -f '{staging}'"),
            timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pane::MemoryPaneManager;

    fn driver(pane: Arc<MemoryPaneManager>) -> PaneDriver {
        PaneDriver::new(pane, Duration::from_millis(1))
    }

    #[test]
    fn run_command_parses_sentinel_status() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("s", None).unwrap();
        // The fake echoes sent lines into the capture; complete the
        // sentinel by hand as a real shell would
        pane.respond_with(|line| {
            line.contains("__RT_")
                .then(|| "file1\nfile2\n__RT_0_DONE_0".to_string())
        });

        let result = driver(pane).run_command("s", "ls", Duration::from_millis(50)).unwrap();
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("file1"));
        assert!(!result.output.contains("__RT_0_DONE_"));
    }

    #[test]
    fn run_command_reports_nonzero_status() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("s", None).unwrap();
        pane.respond_with(|line| {
            line.contains("__RT_").then(|| "__RT_0_DONE_2".to_string())
        });

        let result = driver(pane).run_command("s", "false", Duration::from_millis(50)).unwrap();
        assert_eq!(result.exit_code, 2);
        assert!(!result.success());
    }

    #[test]
    fn run_command_times_out_with_minus_one() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("s", None).unwrap();

        let result = driver(pane)
            .run_command("s", "sleep 999", Duration::from_millis(10))
            .unwrap();
        assert_eq!(result.exit_code, -1);
    }

    #[test]
    fn wait_for_detects_fatal_phrases() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("s", None).unwrap();
        pane.push_output("s", "ssh: Connection refused");

        let outcome = driver(pane)
            .wait_for("s", Duration::from_millis(10), |t| t.contains("never"))
            .unwrap();
        assert!(matches!(outcome, WaitOutcome::Fatal("Connection refused", _)));
    }

    #[test]
    fn upload_sends_chunked_base64() {
        let pane = Arc::new(MemoryPaneManager::new());
        pane.create("s", None).unwrap();
        pane.respond_with(|line| line.contains("__RT_").then(|| "__RT_X_DONE_0".to_string()));

        // Large enough to need several chunks
        let payload = vec![0xA5u8; 2000];
        let d = driver(Arc::clone(&pane));
        let _ = d.upload("s", &payload, "/tmp/blob", Duration::from_millis(50));

        let sent = pane.sent_lines("s");
        let chunk_lines: Vec<&String> = sent.iter().filter(|l| l.contains(">> '/tmp/blob.b64'")).collect();
        assert!(chunk_lines.len() > 2, "expected chunked appends, got {}", chunk_lines.len());
        assert!(sent.iter().any(|l| l.contains("base64 -d")));
    }
}
