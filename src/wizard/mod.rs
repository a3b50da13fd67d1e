//! Multi-step configuration wizard.
//!
//! Three flavours share one field schema ([`fields`]):
//!
//! - the in-chat wizard: a [`session::WizardRegistry`] of ephemeral
//!   sessions advanced one field per `continue_config_session` call
//! - the external-terminal wizard ([`terminal`]): a spawned window
//!   running the blocking prompt loop
//! - direct mode: the dispatcher validates tool arguments against the
//!   same field rules and skips the session machinery entirely

pub mod fields;
pub mod session;
pub mod terminal;

pub use session::{ConfigSession, StepOutcome, WizardRegistry};
