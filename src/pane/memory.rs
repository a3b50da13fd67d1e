//! In-memory pane manager.
//!
//! Models a multiplexer as a map of named scrollback buffers. Useful for
//! exercising the orchestrator without tmux: tests (and dry runs) inject
//! output directly or register a responder that plays the role of the
//! remote shell, mapping each sent line to the output it would produce.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::PaneError;
use crate::pane::PaneManager;

/// Maps one sent line to the output the fake "remote side" prints.
type Responder = Box<dyn Fn(&str) -> Option<String> + Send>;

#[derive(Debug, Default)]
struct PaneState {
    lines: Vec<String>,
    sent: Vec<String>,
}

#[derive(Default)]
struct Inner {
    sessions: BTreeMap<String, PaneState>,
    created: Vec<String>,
    killed: Vec<String>,
    responder: Option<Responder>,
}

/// A [`PaneManager`] backed by in-process buffers.
#[derive(Default)]
pub struct MemoryPaneManager {
    inner: Mutex<Inner>,
}

impl MemoryPaneManager {
    /// Creates an empty manager with no sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the function that turns each sent line into output, as
    /// the remote shell would.
    pub fn respond_with(&self, responder: impl Fn(&str) -> Option<String> + Send + 'static) {
        self.lock().responder = Some(Box::new(responder));
    }

    /// Appends raw output to a session's scrollback.
    pub fn push_output(&self, session: &str, text: &str) {
        let mut inner = self.lock();
        let state = inner.sessions.entry(session.to_string()).or_default();
        state.lines.extend(text.lines().map(str::to_string));
    }

    /// Every line sent to a session, in order.
    #[must_use]
    pub fn sent_lines(&self, session: &str) -> Vec<String> {
        self.lock()
            .sessions
            .get(session)
            .map(|s| s.sent.clone())
            .unwrap_or_default()
    }

    /// Session names passed to `create`, in call order.
    #[must_use]
    pub fn creations(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    /// Session names passed to `kill`, in call order (absent ones included).
    #[must_use]
    pub fn kills(&self) -> Vec<String> {
        self.lock().killed.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for MemoryPaneManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryPaneManager")
            .field("sessions", &inner.sessions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl PaneManager for MemoryPaneManager {
    fn exists(&self, session: &str) -> Result<bool, PaneError> {
        Ok(self.lock().sessions.contains_key(session))
    }

    fn create(&self, session: &str, initial_command: Option<&str>) -> Result<(), PaneError> {
        let mut inner = self.lock();
        inner.created.push(session.to_string());
        let state = inner.sessions.entry(session.to_string()).or_default();
        if let Some(cmd) = initial_command {
            state.lines.push(format!("$ {cmd}"));
        }
        Ok(())
    }

    fn kill(&self, session: &str) -> Result<(), PaneError> {
        let mut inner = self.lock();
        inner.killed.push(session.to_string());
        inner.sessions.remove(session);
        Ok(())
    }

    fn send_keys(&self, session: &str, text: &str, press_enter: bool) -> Result<(), PaneError> {
        let mut inner = self.lock();
        let Some(state) = inner.sessions.get_mut(session) else {
            return Err(PaneError::CommandFailed {
                command: "send-keys".to_string(),
                session: session.to_string(),
                detail: "no such session".to_string(),
            });
        };
        state.sent.push(text.to_string());
        if press_enter {
            // Terminal echo of the typed line
            state.lines.push(text.to_string());
        }
        let response = inner.responder.as_ref().and_then(|r| r(text));
        if let Some(out) = response {
            if let Some(state) = inner.sessions.get_mut(session) {
                state.lines.extend(out.lines().map(str::to_string));
            }
        }
        Ok(())
    }

    fn capture(&self, session: &str, tail_lines: usize) -> Result<String, PaneError> {
        let inner = self.lock();
        let Some(state) = inner.sessions.get(session) else {
            return Err(PaneError::CommandFailed {
                command: "capture-pane".to_string(),
                session: session.to_string(),
                detail: "no such session".to_string(),
            });
        };
        let keep = state.lines.len().saturating_sub(tail_lines);
        Ok(state.lines[keep..].join("\n"))
    }

    fn list(&self) -> Result<Vec<String>, PaneError> {
        Ok(self.lock().sessions.keys().cloned().collect())
    }
}
