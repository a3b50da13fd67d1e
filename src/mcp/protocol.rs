//! JSON-RPC 2.0 message types and parsing.
//!
//! One incoming line is one message. A message with an `id` is a
//! request and gets exactly one response; a message without one is a
//! notification and gets nothing. Parsing failures map to the standard
//! error codes: `-32700` for malformed JSON, `-32600` for a JSON value
//! that is not a valid JSON-RPC 2.0 object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server name advertised in the initialize response.
pub const SERVER_NAME: &str = "remote-terminal-mcp";

/// The JSON-RPC version this server speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum ErrorCode {
    /// Invalid JSON was received.
    ParseError = -32700,
    /// The JSON sent is not a valid request object.
    InvalidRequest = -32600,
    /// The method does not exist.
    MethodNotFound = -32601,
    /// Invalid method parameters.
    InvalidParams = -32602,
    /// Internal JSON-RPC error.
    InternalError = -32603,
}

impl ErrorCode {
    /// The numeric wire value.
    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }
}

/// A request id: number or string, echoed verbatim in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

/// An incoming request (has an `id`).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version marker; must be exactly "2.0".
    pub jsonrpc: String,
    /// Request id, echoed in the response.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// An incoming notification (no `id`; never answered).
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcNotification {
    /// Protocol version marker; must be exactly "2.0".
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A parsed incoming message.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request expecting exactly one response.
    Request(JsonRpcRequest),
    /// A notification expecting nothing.
    Notification(JsonRpcNotification),
}

/// A successful response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,
    /// Echo of the request id.
    pub id: RequestId,
    /// Result payload.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Builds a success response echoing the request id.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// The error member of an error response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorData {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

impl JsonRpcErrorData {
    /// Builds error data from a code and message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
        }
    }
}

/// An error response. `id` is `None` (serialised as `null`) when the
/// failing message's id could not be recovered.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Always "2.0".
    pub jsonrpc: &'static str,
    /// Echo of the request id, or null.
    pub id: Option<RequestId>,
    /// The error payload.
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    /// Builds an error response.
    #[must_use]
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }

    /// `-32700` for a line that is not JSON.
    #[must_use]
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(
            None,
            JsonRpcErrorData::with_message(ErrorCode::ParseError, detail),
        )
    }

    /// `-32600` for JSON that is not a valid request object.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>, detail: impl Into<String>) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, detail),
        )
    }

    /// `-32601` for an unknown method.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(
            Some(id),
            JsonRpcErrorData::with_message(ErrorCode::MethodNotFound, format!("method not found: {method}")),
        )
    }

    /// `-32602` for malformed parameters.
    #[must_use]
    pub fn invalid_params(id: RequestId, detail: impl Into<String>) -> Self {
        Self::new(
            Some(id),
            JsonRpcErrorData::with_message(ErrorCode::InvalidParams, detail),
        )
    }
}

/// Parses one line into a request or notification.
///
/// # Errors
///
/// Returns a ready-to-send [`JsonRpcError`]: `-32700` when the line is
/// not JSON, `-32600` when it is JSON but not a valid JSON-RPC 2.0
/// message.
pub fn parse_message(line: &str) -> Result<IncomingMessage, JsonRpcError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| JsonRpcError::parse_error(format!("invalid JSON: {e}")))?;

    // Recover the id early so even malformed requests can be answered
    // with the right correlation
    let id = value
        .get("id")
        .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

    let version = value.get("jsonrpc").and_then(Value::as_str);
    if version != Some(JSONRPC_VERSION) {
        return Err(JsonRpcError::invalid_request(
            id,
            "missing or unsupported jsonrpc version (expected \"2.0\")",
        ));
    }

    if value.get("method").and_then(Value::as_str).is_none() {
        return Err(JsonRpcError::invalid_request(id, "missing method"));
    }

    // An id field makes it a request; its absence makes it a notification
    if value.get("id").is_some_and(|id| !id.is_null()) {
        let request: JsonRpcRequest = serde_json::from_value(value)
            .map_err(|e| JsonRpcError::invalid_request(id, format!("invalid request: {e}")))?;
        Ok(IncomingMessage::Request(request))
    } else {
        let notification: JsonRpcNotification = serde_json::from_value(value)
            .map_err(|e| JsonRpcError::invalid_request(None, format!("invalid notification: {e}")))?;
        Ok(IncomingMessage::Notification(notification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_request_with_numeric_id() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).unwrap();
        let IncomingMessage::Request(req) = msg else {
            panic!("expected request");
        };
        assert_eq!(req.id, RequestId::Number(1));
        assert_eq!(req.method, "tools/list");
        assert!(req.params.is_none());
    }

    #[test]
    fn parse_request_with_string_id() {
        let msg =
            parse_message(r#"{"jsonrpc":"2.0","id":"req-9","method":"ping"}"#).unwrap();
        let IncomingMessage::Request(req) = msg else {
            panic!("expected request");
        };
        assert_eq!(req.id, RequestId::String("req-9".to_string()));
    }

    #[test]
    fn parse_notification_without_id() {
        let msg =
            parse_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(msg, IncomingMessage::Notification(_)));
    }

    #[test]
    fn null_id_is_a_notification() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","id":null,"method":"x"}"#).unwrap();
        assert!(matches!(msg, IncomingMessage::Notification(_)));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = parse_message("not json at all").unwrap_err();
        assert_eq!(err.error.code, ErrorCode::ParseError.code());
        assert!(err.id.is_none());
    }

    #[test]
    fn missing_jsonrpc_version_is_invalid_request() {
        let err = parse_message(r#"{"id":1,"method":"x"}"#).unwrap_err();
        assert_eq!(err.error.code, ErrorCode::InvalidRequest.code());
        // The id is still echoed for correlation
        assert_eq!(err.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn wrong_jsonrpc_version_is_invalid_request() {
        let err = parse_message(r#"{"jsonrpc":"1.0","id":1,"method":"x"}"#).unwrap_err();
        assert_eq!(err.error.code, ErrorCode::InvalidRequest.code());
    }

    #[test]
    fn missing_method_is_invalid_request() {
        let err = parse_message(r#"{"jsonrpc":"2.0","id":1}"#).unwrap_err();
        assert_eq!(err.error.code, ErrorCode::InvalidRequest.code());
    }

    #[test]
    fn error_serialises_null_id() {
        let err = JsonRpcError::parse_error("boom");
        let rendered = serde_json::to_value(&err).unwrap();
        assert!(rendered["id"].is_null());
        assert_eq!(rendered["error"]["code"], -32700);
    }

    #[test]
    fn response_echoes_id_verbatim() {
        let resp = JsonRpcResponse::success(
            RequestId::String("abc".to_string()),
            serde_json::json!({"ok": true}),
        );
        let rendered = serde_json::to_value(&resp).unwrap();
        assert_eq!(rendered["id"], "abc");
        assert_eq!(rendered["jsonrpc"], "2.0");
    }
}
