//! Tool surface: catalog, results and dispatch.
//!
//! [`catalog`] holds the static tool definitions advertised through
//! `tools/list`; [`dispatcher`] validates arguments and routes each
//! `tools/call` to the config store, the connection orchestrator or the
//! wizard registry. Tool failures of every kind are reported inside the
//! result payload, never as JSON-RPC protocol errors.

pub mod catalog;
pub mod dispatcher;

use serde::Serialize;

pub use catalog::{tool_definitions, ToolDefinition};
pub use dispatcher::ToolDispatcher;

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    ///
    /// Per MCP, tool errors are reported in the result, not as protocol
    /// errors.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// The concatenated text of the result (test convenience).
    #[must_use]
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                ToolContent::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
