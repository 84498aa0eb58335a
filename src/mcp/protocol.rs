//! JSON-RPC 2.0 wire model.
//!
//! Everything the bridge reads off stdin or writes to stdout is one of the
//! value types in this module: a request (carries an `id`, gets exactly one
//! reply), a notification (no `id`, never answered), or an outgoing
//! success/failure envelope. [`parse_message`] turns a raw input line into
//! the right incoming variant, or into the error envelope that should be
//! written back when the line is unusable.
//!
//! Two wire rules drive the shape of these types:
//!
//! - an `id` is a string or an integer and must come back exactly as it
//!   went in, so it is modelled as an untagged enum rather than a number;
//! - a reply carries *either* `result` *or* `error`, never both, so
//!   success and failure are separate types instead of one struct with two
//!   optional fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The MCP protocol version this server reports from `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// A request identifier: integer or string, preserved bit-for-bit.
///
/// `null` is not a valid identifier; a message without an `id` key is a
/// notification, and an explicit `id: null` is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// An integer identifier.
    Number(i64),
    /// A string identifier.
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// An incoming call that expects an answer.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version marker; only `"2.0"` is accepted.
    pub jsonrpc: String,

    /// Identifier echoed back in the reply.
    pub id: RequestId,

    /// Name of the method being invoked.
    pub method: String,

    /// Raw method parameters, left undecoded until the router knows which
    /// shape to expect.
    #[serde(default)]
    pub params: Option<Value>,
}

/// An incoming one-way message. Never answered, not even on error.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcNotification {
    /// Protocol version marker.
    pub jsonrpc: String,

    /// Name of the notification.
    pub method: String,

    /// Raw parameters, if any.
    #[serde(default)]
    pub params: Option<Value>,
}

/// The success envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,

    /// Identifier of the request being answered.
    pub id: RequestId,

    /// The method's result value.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Wraps a result value in the success envelope.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result,
        }
    }
}

/// The standard JSON-RPC error codes, plus the server-defined range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// -32700: the line was not parseable JSON at all.
    ParseError,
    /// -32600: parseable, but not a usable request envelope.
    InvalidRequest,
    /// -32601: no such method (or, here, no such tool).
    MethodNotFound,
    /// -32602: params did not decode into the expected shape.
    InvalidParams,
    /// -32603: the server failed while executing the method.
    InternalError,
    /// -32000..-32099: implementation-defined failures.
    ServerError(i32),
}

impl ErrorCode {
    /// The numeric wire code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError(code) => code,
        }
    }

    /// The canonical message for the code, as the JSON-RPC spec words it.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError(_) => "Server error",
        }
    }
}

/// The `error` member of a failure envelope: code, message, and an
/// optional free-form `data` payload.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorData {
    /// Numeric error code.
    pub code: i32,

    /// Human-readable summary.
    pub message: String,

    /// Extra context for the peer, omitted from the wire when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    /// An error carrying the code's canonical message.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data: None,
        }
    }

    /// An error with a message of the caller's choosing.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Attaches a `data` payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The failure envelope.
///
/// When the offending line never yielded an identifier (it was not valid
/// JSON, say), `id` is `None` and serialises as `null` — the peer still
/// gets a well-formed reply it can correlate with "something went wrong".
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,

    /// Identifier of the failed request, `null` when unknowable.
    pub id: Option<RequestId>,

    /// What went wrong.
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    /// Builds a failure envelope for the given request identifier.
    #[must_use]
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error,
        }
    }

    /// The reply for a line that was not valid JSON.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(None, JsonRpcErrorData::from_code(ErrorCode::ParseError))
    }
}

/// A successfully classified input line.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// Answer with exactly one envelope.
    Request(JsonRpcRequest),
    /// Answer with nothing.
    Notification(JsonRpcNotification),
}

/// Classifies one input line.
///
/// The `id` key decides which variant a line becomes: present means
/// request, absent means notification. Checks run outside-in — JSON
/// syntax first (`ParseError`), then the envelope (`InvalidRequest`):
/// the line must be an object, claim version `"2.0"`, decode into the
/// chosen variant, and (for requests) name a non-empty method.
///
/// # Errors
///
/// Returns the failure envelope to write back for an unusable line. The
/// envelope carries the request's `id` only when decoding got far enough
/// to recover one.
pub fn parse_message(json: &str) -> Result<IncomingMessage, JsonRpcError> {
    let invalid = |id| JsonRpcError::new(id, JsonRpcErrorData::from_code(ErrorCode::InvalidRequest));

    let value: Value = serde_json::from_str(json).map_err(|_| JsonRpcError::parse_error())?;

    let version = value.get("jsonrpc").and_then(Value::as_str);
    if version != Some("2.0") {
        return Err(invalid(None));
    }

    if value.get("id").is_some() {
        let request: JsonRpcRequest =
            serde_json::from_value(value).map_err(|_| invalid(None))?;
        if request.method.is_empty() {
            return Err(invalid(Some(request.id)));
        }
        Ok(IncomingMessage::Request(request))
    } else {
        let notification: JsonRpcNotification =
            serde_json::from_value(value).map_err(|_| invalid(None))?;
        Ok(IncomingMessage::Notification(notification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(error: &JsonRpcError) -> Value {
        serde_json::to_value(error).unwrap()
    }

    #[test]
    fn lines_with_an_id_become_requests() {
        let msg =
            parse_message(r#"{"jsonrpc":"2.0","id":42,"method":"tools/list","params":{}}"#)
                .unwrap();

        let IncomingMessage::Request(request) = msg else {
            panic!("classified as a notification");
        };
        assert_eq!(request.id, RequestId::Number(42));
        assert_eq!(request.method, "tools/list");
        assert_eq!(request.params, Some(json!({})));
    }

    #[test]
    fn lines_without_an_id_become_notifications() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .unwrap();

        let IncomingMessage::Notification(notification) = msg else {
            panic!("classified as a request");
        };
        assert_eq!(notification.method, "notifications/initialized");
        assert!(notification.params.is_none());
    }

    #[test]
    fn string_identifiers_are_requests_too() {
        let msg = parse_message(r#"{"jsonrpc":"2.0","id":"req-7","method":"ping"}"#).unwrap();

        let IncomingMessage::Request(request) = msg else {
            panic!("classified as a notification");
        };
        assert_eq!(request.id, RequestId::String("req-7".to_string()));
    }

    #[test]
    fn garbage_becomes_a_parse_error_with_null_id() {
        let error = parse_message(r#"{"jsonrpc":"2.0" method:invalid}"#).unwrap_err();

        let envelope = wire(&error);
        assert_eq!(envelope["error"]["code"], -32700);
        assert_eq!(envelope["error"]["message"], "Parse error");
        assert_eq!(envelope["id"], Value::Null);
    }

    #[test]
    fn valid_json_that_is_not_an_envelope_is_invalid_request() {
        // An array, a version-less object, and a wrong version all fail
        // the same way.
        for line in [
            r#"[1, 2, 3]"#,
            r#"{"id": 1, "method": "ping"}"#,
            r#"{"jsonrpc": "1.1", "id": 1, "method": "ping"}"#,
        ] {
            let error = parse_message(line).unwrap_err();
            assert_eq!(error.error.code, -32600, "line: {line}");
        }
    }

    #[test]
    fn explicit_null_id_is_rejected() {
        // `id: null` is neither a usable identifier nor the notification
        // form (which omits the key entirely).
        let error = parse_message(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap_err();
        assert_eq!(error.error.code, -32600);
    }

    #[test]
    fn empty_method_is_rejected_but_keeps_the_id() {
        let error = parse_message(r#"{"jsonrpc":"2.0","id":9,"method":""}"#).unwrap_err();
        assert_eq!(error.error.code, -32600);
        assert_eq!(error.id, Some(RequestId::Number(9)));
    }

    #[test]
    fn success_envelope_has_no_error_member() {
        let response = JsonRpcResponse::success(RequestId::String("a".to_string()), json!(true));

        let envelope = serde_json::to_value(&response).unwrap();
        let keys: Vec<&String> = envelope.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["jsonrpc", "id", "result"]);
        assert_eq!(envelope["jsonrpc"], "2.0");
        assert_eq!(envelope["id"], "a");
        assert_eq!(envelope["result"], true);
    }

    #[test]
    fn failure_envelope_has_no_result_member() {
        let error = JsonRpcError::new(
            Some(RequestId::Number(3)),
            JsonRpcErrorData::from_code(ErrorCode::MethodNotFound),
        );

        let envelope = wire(&error);
        let keys: Vec<&String> = envelope.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["jsonrpc", "id", "error"]);
        assert_eq!(envelope["id"], 3);
        assert_eq!(envelope["error"]["code"], -32601);
        assert_eq!(envelope["error"]["message"], "Method not found");
        // No data payload was attached, so the key stays off the wire.
        assert!(envelope["error"].get("data").is_none());
    }

    #[test]
    fn error_data_payload_reaches_the_wire() {
        let error = JsonRpcError::new(
            None,
            JsonRpcErrorData::with_message(ErrorCode::InternalError, "upstream unreachable")
                .with_data(json!({"status": 502})),
        );

        let envelope = wire(&error);
        assert_eq!(envelope["id"], Value::Null);
        assert_eq!(envelope["error"]["message"], "upstream unreachable");
        assert_eq!(envelope["error"]["data"]["status"], 502);
    }

    #[test]
    fn identifiers_keep_their_wire_type() {
        // The same digits as integer and as string must not collapse into
        // one form on the way out.
        let numeric: RequestId = serde_json::from_value(json!(7)).unwrap();
        let textual: RequestId = serde_json::from_value(json!("7")).unwrap();

        assert_ne!(numeric, textual);
        assert_eq!(serde_json::to_value(&numeric).unwrap(), json!(7));
        assert_eq!(serde_json::to_value(&textual).unwrap(), json!("7"));
    }

    #[test]
    fn server_error_codes_pass_through() {
        assert_eq!(ErrorCode::ServerError(-32042).code(), -32042);
        assert_eq!(ErrorCode::ServerError(-32042).message(), "Server error");
    }
}
