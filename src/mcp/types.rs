//! MCP payload types.
//!
//! Request parameters and result shapes for the implemented method set:
//! `initialize`, `tools/list`, `tools/call`, and `ping`. Field names follow
//! the MCP wire format (camelCase).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The sender or recipient of messages and data in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The user.
    User,
    /// The assistant.
    Assistant,
}

/// Optional annotations attached to content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotations {
    /// Who the intended consumer of this content is.
    pub audience: Vec<Role>,

    /// How important this data is for operating the server (0-1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

impl Annotations {
    /// Annotations addressed to the assistant, the audience of every
    /// content item this server emits.
    #[must_use]
    pub fn assistant() -> Self {
        Self {
            audience: vec![Role::Assistant],
            priority: None,
        }
    }
}

/// Content returned by a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Text provided to or from an LLM.
    Text {
        /// The text.
        text: String,
        /// Audience annotations.
        annotations: Annotations,
    },

    /// An image provided to or from an LLM.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type of the decoded bytes.
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Audience annotations.
        annotations: Annotations,
    },
}

impl Content {
    /// Creates text content addressed to the assistant.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            annotations: Annotations::assistant(),
        }
    }

    /// Creates image content addressed to the assistant.
    #[must_use]
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: Annotations::assistant(),
        }
    }
}

/// The JSON Schema describing a tool's accepted arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSchema {
    /// Always `"object"`.
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Property schemas keyed by argument name, in declaration order.
    pub properties: Map<String, Value>,

    /// Names of required arguments.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

/// A single tool in the `tools/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Unique tool name, at most 64 bytes.
    pub name: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,

    /// Schema of the accepted arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

/// Parameters for `tools/list`. The cursor is accepted and ignored; the
/// whole tool list always fits in one page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsListRequest {
    /// Pagination cursor from a previous response.
    #[serde(default)]
    pub cursor: Option<String>,
}

/// The result of `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResponse {
    /// Every projected tool, in stable order.
    pub tools: Vec<Tool>,
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallRequest {
    /// Name of the tool to invoke.
    #[serde(default)]
    pub name: String,

    /// Free-form arguments keyed by parameter or body property name.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// The result of `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResponse {
    /// Content items produced by the call.
    pub content: Vec<Content>,

    /// Whether the call failed in a tool-visible way.
    #[serde(rename = "isError")]
    pub is_error: bool,
}

/// Parameters for `initialize`. Client-supplied fields are accepted and
/// currently unused.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitializeRequest {}

/// Tool-related capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session. The projection
    /// is derived from an immutable document, so this is always `false`.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Information about this MCP implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

/// The result of `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    /// The protocol version this server speaks.
    pub protocol_version: String,
    /// Advertised capabilities.
    pub capabilities: ServerCapabilities,
    /// Server identification.
    pub server_info: ServerInfo,
}

/// Parameters for `ping`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PingRequest {}

/// The result of `ping`: an empty object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PingResponse {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_wire_shape() {
        let content = Content::text("hello");
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hello");
        assert_eq!(json["annotations"]["audience"][0], "assistant");
    }

    #[test]
    fn image_content_wire_shape() {
        let content = Content::image("aGVsbG8=", "image/png");
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["data"], "aGVsbG8=");
        assert_eq!(json["mimeType"], "image/png");
        assert_eq!(json["annotations"]["audience"][0], "assistant");
    }

    #[test]
    fn empty_input_schema_serialises_properties() {
        let schema = InputSchema::default();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["type"], "object");
        assert!(json["properties"].as_object().unwrap().is_empty());
        // required is omitted entirely when empty
        assert!(json.get("required").is_none());
    }

    #[test]
    fn ping_response_is_empty_object() {
        let json = serde_json::to_string(&PingResponse {}).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn tool_call_request_defaults() {
        let params: ToolCallRequest = serde_json::from_str(r#"{"name": "x"}"#).unwrap();
        assert_eq!(params.name, "x");
        assert!(params.arguments.is_empty());
    }

    #[test]
    fn initialize_response_wire_shape() {
        let response = InitializeResponse {
            protocol_version: crate::mcp::protocol::MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo {
                name: "test".to_string(),
                version: "0.0.0".to_string(),
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["protocolVersion"], "2024-11-05");
        assert_eq!(json["capabilities"]["tools"]["listChanged"], false);
        assert_eq!(json["serverInfo"]["name"], "test");
    }
}
