//! The static tool catalog.
//!
//! Every tool the server advertises through `tools/list`, with its JSON
//! Schema input contract. The schemas are the externally observable API
//! for AI hosts; the dispatcher re-validates arguments against the same
//! rules before routing.

use serde::Serialize;
use serde_json::{json, Value};

/// A tool definition for the tools/list response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Returns the full tool catalog.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "list_servers",
            "List all configured remote servers with a one-line summary each.",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        ),
        tool(
            "get_server_info",
            "Show the full configuration of one server. Passwords are redacted.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Server name"}
                },
                "required": ["name"]
            }),
        ),
        tool(
            "get_server_status",
            "Report whether the server's terminal session exists and show its recent output.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Server name"}
                },
                "required": ["name"]
            }),
        ),
        tool(
            "connect_server",
            "Connect to a server: rebuild its terminal session, run the SSH/relay sequence, \
             optionally enter its Docker container, set up the shell and deploy file sync.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Server name"},
                    "force_recreate": {
                        "type": "boolean",
                        "description": "Kill and rebuild an existing session (default true)",
                        "default": true
                    },
                    "timeout_sec": {
                        "type": "integer",
                        "description": "Overall connect timeout in seconds (default 120)"
                    }
                },
                "required": ["name"]
            }),
        ),
        tool(
            "disconnect_server",
            "Kill the server's terminal session. Safe to repeat.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Server name"}
                },
                "required": ["name"]
            }),
        ),
        tool(
            "execute_command",
            "Run a command in the server's live terminal session and return its output.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Server name"},
                    "command": {"type": "string", "description": "Command line to run"},
                    "timeout_sec": {
                        "type": "integer",
                        "description": "Seconds to wait for completion (default 30)"
                    }
                },
                "required": ["name", "command"]
            }),
        ),
        tool(
            "run_local_command",
            "Run a command on the local machine (not in any terminal session) and return \
             stdout, stderr and the exit code.",
            json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "Command line to run"},
                    "timeout_sec": {
                        "type": "integer",
                        "description": "Seconds to wait for completion (default 30)"
                    }
                },
                "required": ["command"]
            }),
        ),
        tool(
            "create_server_config",
            "Register a new server. By default starts an in-chat wizard that collects one \
             field per continue_config_session call; with interactive=false all required \
             fields must be supplied as arguments; with cursor_interactive=false a local \
             terminal window runs the wizard instead.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Server name (3-20 chars)"},
                    "host": {"type": "string", "description": "Host name or IP"},
                    "username": {"type": "string", "description": "Login username"},
                    "port": {"type": "integer", "description": "SSH port (default 22)"},
                    "connection_type": {
                        "type": "string",
                        "enum": ["ssh", "relay"],
                        "description": "How the host is reached (default ssh)"
                    },
                    "docker_enabled": {"type": "boolean", "description": "Use a Docker container"},
                    "docker_container": {"type": "string", "description": "Container name"},
                    "docker_image": {"type": "string", "description": "Image for auto-created containers"},
                    "sync_enabled": {"type": "boolean", "description": "Enable file auto-sync"},
                    "sync_ftp_port": {"type": "integer", "description": "Sync FTP port"},
                    "sync_ftp_user": {"type": "string", "description": "Sync FTP username"},
                    "sync_ftp_password": {"type": "string", "description": "Sync FTP password"},
                    "interactive": {
                        "type": "boolean",
                        "description": "Collect fields interactively (default true)",
                        "default": true
                    },
                    "cursor_interactive": {
                        "type": "boolean",
                        "description": "Run the wizard in-chat rather than in a terminal window (default true)",
                        "default": true
                    }
                }
            }),
        ),
        tool(
            "continue_config_session",
            "Supply one field value to an in-chat configuration wizard session.",
            json!({
                "type": "object",
                "properties": {
                    "session_id": {"type": "string", "description": "Wizard session id (config_*)"},
                    "field_name": {"type": "string", "description": "Name of the field being answered"},
                    "field_value": {"type": "string", "description": "Value for the field (empty accepts the default)"}
                },
                "required": ["session_id", "field_name", "field_value"]
            }),
        ),
        tool(
            "update_server_config",
            "Update an existing server. Starts the wizard pre-filled with current values \
             unless interactive=false, in which case the supplied fields are merged directly.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Server to update"},
                    "host": {"type": "string"},
                    "username": {"type": "string"},
                    "port": {"type": "integer"},
                    "connection_type": {"type": "string", "enum": ["ssh", "relay"]},
                    "docker_enabled": {"type": "boolean"},
                    "docker_container": {"type": "string"},
                    "docker_image": {"type": "string"},
                    "sync_enabled": {"type": "boolean"},
                    "sync_ftp_port": {"type": "integer"},
                    "sync_ftp_user": {"type": "string"},
                    "sync_ftp_password": {"type": "string"},
                    "interactive": {
                        "type": "boolean",
                        "description": "Use the wizard (default true)",
                        "default": true
                    },
                    "cursor_interactive": {
                        "type": "boolean",
                        "description": "Run the wizard in-chat (default true)",
                        "default": true
                    }
                },
                "required": ["name"]
            }),
        ),
        tool(
            "delete_server_config",
            "Remove a server from the registry. Safe to repeat.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Server to remove"}
                },
                "required": ["name"]
            }),
        ),
        tool(
            "diagnose_connection",
            "Inspect the server's session, check host reachability and report advice.",
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Server name"}
                },
                "required": ["name"]
            }),
        ),
    ]
}
