//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP convention for exposing remote-server
//! lifecycle operations as tools to AI assistants. The server
//! communicates over stdio transport using line-delimited JSON-RPC 2.0
//! messages.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MCP Server                          │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │   │  Transport  │───▶│   Server    │───▶│ Dispatcher  │     │
//! │   │   (stdio)   │    │ (lifecycle) │    │   (tools)   │     │
//! │   └─────────────┘    └─────────────┘    └─────────────┘     │
//! │          │                  │                  │            │
//! │          ▼                  ▼                  ▼            │
//! │   ┌─────────────────────────────────────────────────┐       │
//! │   │              JSON-RPC Messages                  │       │
//! │   └─────────────────────────────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Stdout purity
//!
//! Every byte on stdout is part of exactly one JSON-RPC response line.
//! All logging goes to stderr; notifications produce no output at all.

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use server::{McpServer, ServerState};
pub use transport::StdioTransport;
