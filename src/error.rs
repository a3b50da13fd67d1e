//! Error types for remote-terminal-mcp.
//!
//! # Security Note
//!
//! Error messages are carefully crafted to NEVER include passwords or
//! other credentials. Variants that relate to authentication carry only
//! the server or host name, never the secret that was being used.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the configuration store.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be written.
    #[error("failed to write configuration file: {path}")]
    WriteError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be serialised to YAML.
    #[error("failed to serialise configuration: {message}")]
    SerialiseError {
        /// Description of the serialisation failure.
        message: String,
    },

    /// The advisory lock on the configuration file could not be acquired.
    ///
    /// Raised after the retry budget is exhausted; another tool call or
    /// process is holding the lock.
    #[error("configuration file is locked by another process: {path}")]
    Locked {
        /// Path to the lock file.
        path: PathBuf,
    },

    /// A post-write verification found a server missing from disk.
    #[error("post-write verification failed: server '{name}' missing from {path}")]
    VerifyFailed {
        /// Name of the server that should have been written.
        name: String,
        /// Path to the configuration file.
        path: PathBuf,
    },

    /// A server record failed validation.
    #[error("invalid server configuration: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },

    /// The named server does not exist in the registry.
    #[error("server '{name}' is not configured")]
    UnknownServer {
        /// The requested server name.
        name: String,
    },
}

/// Errors that can occur when driving the pane manager.
#[derive(Error, Debug)]
pub enum PaneError {
    /// The multiplexer binary was not found on PATH.
    #[error("terminal multiplexer not found: {name}")]
    MultiplexerNotFound {
        /// Name of the missing binary.
        name: String,
    },

    /// A multiplexer invocation could not be spawned.
    #[error("failed to run {command}")]
    SpawnError {
        /// The command that failed to start.
        command: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A multiplexer invocation exited with a failure status.
    #[error("{command} failed for session '{session}': {detail}")]
    CommandFailed {
        /// The multiplexer subcommand.
        command: String,
        /// The target session name.
        session: String,
        /// Captured stderr or a short description.
        detail: String,
    },
}
