//! Connection orchestration.
//!
//! Composes the pane manager, the readiness detector and the optional
//! environment/sync phases into the user-level connect operation:
//!
//! - [`driver`] — sentinel-tracked command execution and uploads
//!   through a pane
//! - [`readiness`] — pure marker detection over captured output
//! - [`orchestrator`] — the connect state machine
//! - [`environment`] — in-container zsh setup (best-effort)
//! - [`sync`] — FTP server deployment plus local client config
//!   (best-effort)
//! - [`diagnose`] — the `diagnose_connection` report

pub mod diagnose;
pub mod driver;
pub mod environment;
pub mod orchestrator;
pub mod readiness;
pub mod sync;

pub use orchestrator::{ConnectError, ConnectOutcome, Orchestrator};
