//! remote-terminal-mcp: MCP server for remote-server lifecycle operations.
//!
//! This library exposes SSH/relay/Docker connection management as MCP
//! tools for AI assistants. The server speaks line-delimited JSON-RPC
//! 2.0 over stdio and drives locally-spawned terminal-multiplexer
//! sessions; it implements no SSH client, container runtime or FTP
//! server of its own.
//!
//! # Architecture
//!
//! One tool call flows `stdin → mcp → tools → {config | connect | wizard}
//! → mcp → stdout`. Tool calls are strictly sequential; the registry on
//! disk is the single source of truth and is re-read on every call.
//!
//! # Modules
//!
//! - [`mcp`] — JSON-RPC transport, lifecycle and method routing
//! - [`tools`] — tool catalog and dispatch
//! - [`config`] — the YAML server registry and its store
//! - [`connect`] — the connection orchestrator and its phases
//! - [`pane`] — the terminal-multiplexer abstraction (tmux, in-memory)
//! - [`wizard`] — the multi-step configuration wizard
//! - [`local`] — bounded local command execution
//! - [`assets`] — embedded rc templates and the sync server bundle
//! - [`error`] — shared error types

pub mod assets;
pub mod config;
pub mod connect;
pub mod error;
pub mod local;
pub mod mcp;
pub mod pane;
pub mod tools;
pub mod wizard;
