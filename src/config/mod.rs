//! Server registry: data model and persistence.
//!
//! The registry is a single YAML document at
//! `~/.remote-terminal/config.yaml` (path injectable for tests) holding a
//! `servers` mapping plus optional `global_settings`. See [`store`] for
//! the read/merge-write semantics and [`model`] for the record types and
//! validation rules.

pub mod lock;
pub mod model;
pub mod store;

pub use model::{
    ConnectionType, DockerConfig, JumpHost, Registry, ServerConfig, ShellKind, SyncConfig,
};
pub use store::ConfigStore;
