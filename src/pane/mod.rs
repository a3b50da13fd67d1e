//! Pane manager abstraction.
//!
//! The core never talks to a terminal multiplexer directly; everything
//! goes through the [`PaneManager`] trait, which models the six
//! operations the orchestrator needs. The production implementation
//! drives the `tmux` binary ([`tmux::TmuxPaneManager`]); tests supply
//! scripted fakes.
//!
//! Pane sessions are externally shared resources. The core owns only the
//! names matching its `<server>_session` scheme and freely creates and
//! kills those; it never assumes a session it did not just create is in
//! any particular state.

pub mod memory;
pub mod tmux;

use crate::error::PaneError;

pub use memory::MemoryPaneManager;
pub use tmux::TmuxPaneManager;

/// Default capture window, in lines.
pub const DEFAULT_TAIL_LINES: usize = 40;

/// The operations the core invokes on the external multiplexer.
pub trait PaneManager {
    /// Whether a session with this name currently exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the multiplexer cannot be invoked at all.
    fn exists(&self, session: &str) -> Result<bool, PaneError>;

    /// Creates a detached session, optionally running an initial command.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be created.
    fn create(&self, session: &str, initial_command: Option<&str>) -> Result<(), PaneError>;

    /// Kills a session. Idempotent: killing an absent session succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error only if the multiplexer cannot be invoked.
    fn kill(&self, session: &str) -> Result<(), PaneError>;

    /// Types `text` into the session, optionally followed by Enter.
    ///
    /// # Errors
    ///
    /// Returns an error if the keys cannot be delivered.
    fn send_keys(&self, session: &str, text: &str, press_enter: bool) -> Result<(), PaneError>;

    /// Captures the last `tail_lines` lines of the session's pane.
    ///
    /// # Errors
    ///
    /// Returns an error if the pane cannot be captured.
    fn capture(&self, session: &str, tail_lines: usize) -> Result<String, PaneError>;

    /// Names of all live sessions.
    ///
    /// # Errors
    ///
    /// Returns an error only if the multiplexer cannot be invoked.
    fn list(&self) -> Result<Vec<String>, PaneError>;
}
