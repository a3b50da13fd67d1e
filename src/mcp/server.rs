//! MCP server lifecycle.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: capability advertisement and protocol-version
//!    echo
//! 2. **Operation**: tools/list and tools/call handling
//! 3. **Shutdown**: EOF on stdin
//!
//! # Lifecycle Flow
//!
//! ```text
//! Client                     Server
//!   │                          │
//!   ├─── initialize ──────────▶│
//!   │◀── initialize result ────┤
//!   ├─── initialized ─────────▶│  (notification, no reply)
//!   │                          │
//!   ├─── tools/list ──────────▶│
//!   │◀── tools list ───────────┤
//!   ├─── tools/call ──────────▶│
//!   │◀── call result ──────────┤
//!   │                          │
//!   ├─── (close stdin) ───────▶│  exit
//! ```
//!
//! The requested protocol version is echoed back verbatim: versions are
//! opaque strings and the client decides compatibility. Tool requests
//! are accepted as soon as `initialize` has been answered; hosts do not
//! reliably send `notifications/initialized` before their first
//! `tools/list`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mcp::protocol::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, RequestId, SERVER_NAME,
};
use crate::mcp::transport::StdioTransport;
use crate::tools::{tool_definitions, ToolDispatcher};

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize answered, waiting for the initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "std::ops::Not::not")]
    pub list_changed: bool,
}

/// Server information for the initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by the client; echoed back verbatim.
    pub protocol_version: String,
    /// Client capabilities (unused).
    #[serde(default)]
    pub capabilities: Value,
    /// Client information (unused).
    #[serde(default)]
    pub client_info: Value,
}

/// Parameters for the tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// One outgoing line: a success response or an error response.
#[derive(Debug)]
pub enum Outgoing {
    /// Success response.
    Response(JsonRpcResponse),
    /// Error response.
    Error(JsonRpcError),
}

impl Outgoing {
    /// Serialises to the single line that goes on stdout.
    ///
    /// # Errors
    ///
    /// Returns an error when serialisation fails (should not happen for
    /// well-formed payloads).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Response(resp) => serde_json::to_string(resp),
            Self::Error(err) => serde_json::to_string(err),
        }
    }
}

/// The MCP server.
pub struct McpServer {
    /// Current server state.
    state: ServerState,
    /// Tool dispatcher handling tools/call.
    dispatcher: ToolDispatcher,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
}

impl McpServer {
    /// Creates a server around a tool dispatcher.
    #[must_use]
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            dispatcher,
            protocol_version: None,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// The version echoed during initialisation, once initialised.
    #[must_use]
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Runs the server main loop over stdio until the client closes the
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> std::io::Result<()> {
        let mut transport = StdioTransport::new();
        loop {
            let Some(line) = transport.read_line().await? else {
                // EOF - client closed the connection
                self.state = ServerState::ShuttingDown;
                break;
            };

            if line.trim().is_empty() {
                continue;
            }

            if let Some(outgoing) = self.process_line(&line) {
                match outgoing {
                    Outgoing::Response(resp) => transport.write_response(&resp).await?,
                    Outgoing::Error(err) => transport.write_error(&err).await?,
                }
            }
        }
        Ok(())
    }

    /// Handles one input line. `None` means the line was a notification
    /// and produces zero bytes of output.
    pub fn process_line(&mut self, line: &str) -> Option<Outgoing> {
        match parse_message(line) {
            Ok(IncomingMessage::Request(req)) => Some(self.handle_request(req)),
            Ok(IncomingMessage::Notification(ref notif)) => {
                self.handle_notification(notif);
                None
            }
            Err(error) => Some(Outgoing::Error(error)),
        }
    }

    /// Handles an incoming request.
    fn handle_request(&mut self, req: JsonRpcRequest) -> Outgoing {
        let result = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "tools/list" => self.handle_tools_list(&req),
            "tools/call" => self.handle_tools_call(&req),
            "ping" => Ok(Self::handle_ping(&req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };
        match result {
            Ok(resp) => Outgoing::Response(resp),
            Err(err) => Outgoing::Error(err),
        }
    }

    /// Handles an incoming notification.
    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            self.state = ServerState::Running;
        }
        // All other notifications (including unknown ones) are ignored
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidRequest,
                    "Server already initialised",
                ),
            ));
        }

        let params: InitializeParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(req.id.clone(), format!("Invalid initialize params: {e}"))
            })?
            .ok_or_else(|| {
                JsonRpcError::invalid_params(req.id.clone(), "Missing initialize params")
            })?;

        // Echo the requested version verbatim; versions are opaque
        // strings and compatibility is the client's decision
        self.protocol_version = Some(params.protocol_version.clone());
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": params.protocol_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });
        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_initialised(&req.id)?;

        let result = json!({
            "tools": tool_definitions(),
        });
        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    /// Handles the tools/call request.
    fn handle_tools_call(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_initialised(&req.id)?;

        let params: ToolCallParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(req.id.clone(), format!("Invalid tool call params: {e}"))
            })?
            .ok_or_else(|| {
                JsonRpcError::invalid_params(req.id.clone(), "Missing tool call params")
            })?;

        let result = self.dispatcher.dispatch(&params.name, &params.arguments);
        let payload = serde_json::to_value(result).map_err(|e| {
            JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::InternalError,
                    format!("could not serialise tool result: {e}"),
                ),
            )
        })?;
        Ok(JsonRpcResponse::success(req.id.clone(), payload))
    }

    /// Handles the ping request; allowed in any state.
    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    /// Ensures initialize has been answered. The initialized
    /// notification is not required first; hosts interleave.
    fn require_initialised(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        match self.state {
            ServerState::Initialising | ServerState::Running => Ok(()),
            ServerState::AwaitingInit | ServerState::ShuttingDown => Err(JsonRpcError::new(
                Some(id.clone()),
                JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, "Server not initialised"),
            )),
        }
    }
}
