//! MCP server for OpenAPI-backed tools.
//!
//! This module implements the protocol router and the two halves of the
//! OpenAPI bridge:
//!
//! 1. **Projection**: every operation with a non-empty `operationId` becomes
//!    an MCP tool whose `inputSchema` is derived from the operation's
//!    parameters and JSON request body.
//! 2. **Invocation**: a `tools/call` is mapped back to its operation, bound
//!    into an HTTP request (path/query/header/body), dispatched through the
//!    injected client, and the response classified into MCP content.
//!
//! The OpenAPI model is parsed once at construction and never mutated, so
//! handling needs no locking.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::OperationFilter;
use crate::http::{HttpDispatch, OutboundRequest};
use crate::mcp::protocol::{
    ErrorCode, JsonRpcError, JsonRpcErrorData, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, MCP_PROTOCOL_VERSION,
};
use crate::mcp::transport::RequestHandler;
use crate::mcp::types::{
    Content, InitializeRequest, InitializeResponse, InputSchema, PingRequest, PingResponse,
    ServerCapabilities, ServerInfo, Tool, ToolCallRequest, ToolCallResponse, ToolsListRequest,
    ToolsListResponse,
};
use crate::openapi::{HttpMethod, Operation, OperationRef, Parameter, ParameterLocation, SpecDocument};

/// Maximum tool name length in bytes.
const MAX_TOOL_NAME_LEN: usize = 64;

/// RFC 3986 §3.3 path segment escaping: everything except unreserved
/// characters, sub-delims, `:` and `@` is percent-encoded.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Client handshake complete.
    Running,
}

/// The MCP server bridging to an OpenAPI-described HTTP API.
pub struct Server {
    /// The parsed, immutable specification.
    spec: SpecDocument,
    /// First server URL, trailing slash stripped.
    base_url: String,
    /// Injected HTTP dispatch (auth, retries, and pacing live there).
    client: Arc<dyn HttpDispatch>,
    /// Identity reported by `initialize`.
    info: ServerInfo,
    /// Operation filter; the default allows everything.
    filter: OperationFilter,
    /// Handshake progress, tracked for diagnostics only.
    state: ServerState,
}

impl Server {
    /// Creates a server over a parsed specification.
    ///
    /// The specification's first server URL (validated at parse time)
    /// becomes the base for every outbound request.
    #[must_use]
    pub fn new(spec: SpecDocument, client: Arc<dyn HttpDispatch>, info: ServerInfo) -> Self {
        let base_url = spec.base_url().to_string();
        info!(%base_url, "server initialised with OpenAPI spec");

        Self {
            spec,
            base_url,
            client,
            info,
            filter: OperationFilter::default(),
            state: ServerState::AwaitingInit,
        }
    }

    /// Installs an operation filter.
    #[must_use]
    pub fn with_filter(mut self, filter: OperationFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Returns the current handshake state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Decodes method params, defaulting when absent.
    fn decode_params<P: DeserializeOwned + Default>(
        params: Option<&Value>,
    ) -> Result<P, JsonRpcErrorData> {
        match params {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                JsonRpcErrorData::with_message(ErrorCode::InvalidParams, format!("Invalid params: {e}"))
            }),
            None => Ok(P::default()),
        }
    }

    /// Serialises a handler result into the response envelope.
    fn encode_result<T: Serialize>(result: &T) -> Result<Value, JsonRpcErrorData> {
        serde_json::to_value(result).map_err(|e| {
            JsonRpcErrorData::with_message(
                ErrorCode::InternalError,
                format!("failed to serialise result: {e}"),
            )
        })
    }

    /// Routes a request to its handler.
    ///
    /// Every arm shares the same shape: decode params, run the handler,
    /// encode the result. Errors come back without an ID; the caller
    /// attaches it.
    async fn dispatch(&mut self, request: &JsonRpcRequest) -> Result<Value, JsonRpcErrorData> {
        match request.method.as_str() {
            "initialize" => {
                let params: InitializeRequest = Self::decode_params(request.params.as_ref())?;
                let response = self.initialize(&params);
                Self::encode_result(&response)
            }
            "tools/list" => {
                let params: ToolsListRequest = Self::decode_params(request.params.as_ref())?;
                let response = self.tools_list(&params);
                Self::encode_result(&response)
            }
            "tools/call" => {
                let params: ToolCallRequest = Self::decode_params(request.params.as_ref())?;
                let response = self.tools_call(params).await?;
                Self::encode_result(&response)
            }
            "ping" | "ping/ping" => {
                let _params: PingRequest = Self::decode_params(request.params.as_ref())?;
                Self::encode_result(&PingResponse {})
            }
            _ => {
                warn!(method = %request.method, "unknown method requested");
                Err(JsonRpcErrorData::from_code(ErrorCode::MethodNotFound))
            }
        }
    }

    /// Handles `initialize`.
    ///
    /// Accepted in any state; the handshake is not a precondition for
    /// serving tools.
    fn initialize(&mut self, _params: &InitializeRequest) -> InitializeResponse {
        if self.state == ServerState::AwaitingInit {
            self.state = ServerState::Initialising;
        }

        InitializeResponse {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: self.info.clone(),
        }
    }

    /// Handles `tools/list`: projects every eligible operation.
    fn tools_list(&self, _params: &ToolsListRequest) -> ToolsListResponse {
        let mut tools = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();

        for op_ref in self.eligible_operations() {
            let operation_id = &op_ref.operation.operation_id;
            debug!(
                %operation_id,
                method = %op_ref.method,
                path = op_ref.path,
                "discovered tool"
            );

            let tool = project_tool(&op_ref);
            if let Some(previous) = seen.insert(tool.name.clone(), operation_id.clone()) {
                // Hash-suffix collision within one spec. The first
                // operation keeps the name; calls become ambiguous.
                warn!(
                    tool = %tool.name,
                    first = %previous,
                    second = %operation_id,
                    "ambiguous tool name: two operation IDs map to the same tool"
                );
            }
            tools.push(tool);
        }

        info!(count = tools.len(), "tools discovery completed");
        ToolsListResponse { tools }
    }

    /// Handles `tools/call`: finds the operation, binds arguments, issues
    /// the HTTP request, and classifies the response.
    async fn tools_call(
        &self,
        params: ToolCallRequest,
    ) -> Result<ToolCallResponse, JsonRpcErrorData> {
        let Some(op_ref) = self.find_operation(&params.name) else {
            return Err(JsonRpcErrorData::from_code(ErrorCode::MethodNotFound));
        };

        let request = self.bind_request(&op_ref, &params.arguments)?;
        debug!(method = %request.method, url = %request.url, "dispatching tool call");

        let response = self.client.execute(request).await.map_err(|e| {
            JsonRpcErrorData::with_message(
                ErrorCode::InternalError,
                format!("HTTP request failed: {e}"),
            )
        })?;

        if response.status.as_u16() >= 400 {
            let content = Content::text(format!(
                "Request failed with status {}: {}",
                response.status.as_u16(),
                String::from_utf8_lossy(&response.body)
            ));
            let data = serde_json::to_value(&content).unwrap_or(Value::Null);
            return Err(JsonRpcErrorData::from_code(ErrorCode::InternalError).with_data(data));
        }

        let content_type = response.content_type().unwrap_or("").to_string();
        let content = if content_type.starts_with("image/") {
            Content::image(BASE64_STANDARD.encode(&response.body), content_type)
        } else if content_type.contains("application/json") {
            match serde_json::from_slice::<Value>(&response.body) {
                Ok(value) => Content::text(
                    serde_json::to_string_pretty(&value)
                        .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).into_owned()),
                ),
                Err(_) => Content::text(String::from_utf8_lossy(&response.body).into_owned()),
            }
        } else {
            Content::text(String::from_utf8_lossy(&response.body).into_owned())
        };

        Ok(ToolCallResponse {
            content: vec![content],
            is_error: false,
        })
    }

    /// Iterates operations that are projectable: non-empty `operationId`
    /// and not switched off by the filter.
    fn eligible_operations(&self) -> impl Iterator<Item = OperationRef<'_>> {
        self.spec.operations().filter(|op_ref| {
            !op_ref.operation.operation_id.is_empty()
                && self.filter.allows(
                    op_ref.method,
                    op_ref.path,
                    &op_ref.operation.operation_id,
                )
        })
    }

    /// Maps a tool name back to its operation.
    fn find_operation(&self, name: &str) -> Option<OperationRef<'_>> {
        self.eligible_operations()
            .find(|op_ref| tool_name(&op_ref.operation.operation_id) == name)
    }

    /// Builds the outbound HTTP request for an operation and its arguments.
    fn bind_request(
        &self,
        op_ref: &OperationRef<'_>,
        arguments: &serde_json::Map<String, Value>,
    ) -> Result<OutboundRequest, JsonRpcErrorData> {
        let base = parse_base_url(&self.base_url)?;

        // Normalise the operation path, then prepend the base path.
        let mut path = clean_path(op_ref.path);
        let base_path = base.path();
        if !base_path.is_empty() && base_path != "/" {
            path = clean_path(&format!("{base_path}{path}"));
        }

        // Bind parameters by location: path-item parameters first, then
        // operation parameters.
        let mut query: IndexMap<String, String> = IndexMap::new();
        let mut headers = HeaderMap::new();
        let parameters = op_ref
            .path_item
            .parameters
            .iter()
            .chain(op_ref.operation.parameters.iter());

        for param in parameters {
            let Some(value) = arguments.get(&param.name) else {
                continue;
            };
            bind_parameter(param, value, &mut path, &mut query, &mut headers)?;
        }

        let mut url = base;
        url.set_query(None);
        url.set_fragment(None);
        url.set_path(&path);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &query {
                pairs.append_pair(name, value);
            }
        }

        // Only declared body properties are forwarded, in declaration
        // order; anything else in `arguments` stays out of the body.
        let body = build_body(op_ref.operation, arguments)?;
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        Ok(OutboundRequest {
            method: request_method(op_ref.method),
            url,
            headers,
            body,
        })
    }

    /// Handles an incoming notification.
    fn observe_notification(&mut self, notification: &JsonRpcNotification) {
        if notification.method == "notifications/initialized" {
            debug!("client initialisation complete");
            self.state = ServerState::Running;
        } else {
            debug!(method = %notification.method, "ignoring notification");
        }
    }
}

#[async_trait]
impl RequestHandler for Server {
    async fn handle_request(
        &mut self,
        request: JsonRpcRequest,
    ) -> Result<JsonRpcResponse, JsonRpcError> {
        debug!(method = %request.method, id = %request.id, "handling request");

        match self.dispatch(&request).await {
            Ok(result) => Ok(JsonRpcResponse::success(request.id, result)),
            Err(error) => {
                warn!(method = %request.method, code = error.code, "request failed");
                Err(JsonRpcError::new(Some(request.id), error))
            }
        }
    }

    fn handle_notification(&mut self, notification: &JsonRpcNotification) {
        self.observe_notification(notification);
    }
}

/// Converts a projected method to the HTTP client's method type.
fn request_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
    }
}

/// Parses the base URL, defaulting the scheme to `http` when missing.
fn parse_base_url(base_url: &str) -> Result<reqwest::Url, JsonRpcErrorData> {
    match reqwest::Url::parse(base_url) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            reqwest::Url::parse(&format!("http://{base_url}")).map_err(|e| {
                JsonRpcErrorData::with_message(
                    ErrorCode::InternalError,
                    format!("invalid base URL '{base_url}': {e}"),
                )
            })
        }
        Err(e) => Err(JsonRpcErrorData::with_message(
            ErrorCode::InternalError,
            format!("invalid base URL '{base_url}': {e}"),
        )),
    }
}

/// Binds one supplied parameter into its declared location.
fn bind_parameter(
    param: &Parameter,
    value: &Value,
    path: &mut String,
    query: &mut IndexMap<String, String>,
    headers: &mut HeaderMap,
) -> Result<(), JsonRpcErrorData> {
    match param.location {
        ParameterLocation::Path => {
            let escaped = path_segment_escape(&scalar_text(value));
            *path = path.replace(&format!("{{{}}}", param.name), &escaped);
        }
        ParameterLocation::Query => {
            // Arrays serialise comma-joined; a repeated name replaces the
            // earlier binding.
            let text = match value {
                Value::Array(items) => items
                    .iter()
                    .map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(","),
                other => scalar_text(other),
            };
            query.insert(param.name.clone(), text);
        }
        ParameterLocation::Header => {
            let name = HeaderName::from_bytes(param.name.as_bytes()).map_err(|e| {
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidParams,
                    format!("invalid header name '{}': {e}", param.name),
                )
            })?;
            let header = HeaderValue::from_str(&scalar_text(value)).map_err(|e| {
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidParams,
                    format!("invalid header value for '{}': {e}", param.name),
                )
            })?;
            headers.append(name, header);
        }
        ParameterLocation::Other => {}
    }
    Ok(())
}

/// Builds the JSON body from declared-and-supplied properties.
fn build_body(
    operation: &Operation,
    arguments: &serde_json::Map<String, Value>,
) -> Result<Option<Vec<u8>>, JsonRpcErrorData> {
    let Some(schema) = operation.json_body_schema() else {
        return Ok(None);
    };

    let mut body = serde_json::Map::new();
    for name in schema.properties.keys() {
        if let Some(value) = arguments.get(name) {
            body.insert(name.clone(), value.clone());
        }
    }

    if body.is_empty() {
        return Ok(None);
    }

    serde_json::to_vec(&Value::Object(body)).map(Some).map_err(|e| {
        JsonRpcErrorData::with_message(
            ErrorCode::InvalidParams,
            format!("failed to encode request body: {e}"),
        )
    })
}

/// Canonical textual representation of a scalar argument.
///
/// Strings appear bare (no quotes); every other value uses its JSON form.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Escapes a value for use as a URL path segment per RFC 3986 §3.3.
///
/// Unreserved characters, sub-delims, `:` and `@` pass through verbatim.
fn path_segment_escape(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Normalises a URL path: leading slash, duplicate slashes collapsed,
/// `.` and `..` segments resolved. `..` never climbs above the root.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Derives the tool name for an operation ID.
///
/// IDs of at most 64 bytes are used as-is. Longer IDs keep their first 55
/// bytes, followed by `_` and the first 8 characters of the URL-safe
/// base64 SHA-256 of the full ID, keeping the mapping deterministic and
/// unique within a document.
fn tool_name(operation_id: &str) -> String {
    if operation_id.len() <= MAX_TOOL_NAME_LEN {
        return operation_id.to_string();
    }

    let digest = Sha256::digest(operation_id.as_bytes());
    let encoded = URL_SAFE_NO_PAD.encode(digest);

    // Back off to a character boundary; operation IDs are almost always
    // ASCII, in which case this is exactly byte 55.
    let mut head_len = 55;
    while !operation_id.is_char_boundary(head_len) {
        head_len -= 1;
    }

    format!("{}_{}", &operation_id[..head_len], &encoded[..8])
}

/// Projects one operation into a tool descriptor.
fn project_tool(op_ref: &OperationRef<'_>) -> Tool {
    let operation = op_ref.operation;
    let mut input_schema = InputSchema::default();

    // Path-item parameters first, then operation parameters; a same-name
    // operation parameter overwrites the path-item entry.
    let parameters = op_ref
        .path_item
        .parameters
        .iter()
        .chain(operation.parameters.iter());
    for param in parameters {
        let Some(schema) = &param.schema else {
            continue;
        };

        let mut property = json!({
            "type": schema.type_or_default(),
        });
        if let Some(pattern) = &schema.pattern {
            property["pattern"] = json!(pattern);
        }
        property["description"] = json!(param.description);

        input_schema
            .properties
            .insert(param.name.clone(), property);
        if param.required && !input_schema.required.contains(&param.name) {
            input_schema.required.push(param.name.clone());
        }
    }

    // Request body properties, in declaration order.
    if let Some(body_schema) = operation.json_body_schema() {
        for (name, property_schema) in &body_schema.properties {
            input_schema.properties.insert(
                name.clone(),
                json!({
                    "type": property_schema.type_or_default(),
                    "description": property_schema.description,
                }),
            );
        }
        for name in &body_schema.required {
            if !input_schema.required.contains(name) {
                input_schema.required.push(name.clone());
            }
        }
    }

    let description = if operation.description.is_empty() {
        operation.summary.clone()
    } else {
        operation.description.clone()
    };

    Tool {
        name: tool_name(&operation.operation_id),
        description,
        input_schema,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_operation_id_is_used_verbatim() {
        assert_eq!(tool_name("listPets"), "listPets");

        let exactly_64 = "a".repeat(64);
        assert_eq!(tool_name(&exactly_64), exactly_64);
    }

    #[test]
    fn long_operation_id_is_truncated_with_hash() {
        let long_id = "a".repeat(100);
        let name = tool_name(&long_id);

        assert_eq!(name.len(), MAX_TOOL_NAME_LEN);
        assert_eq!(name.as_bytes()[55], b'_');
        assert_eq!(&name[..55], &long_id[..55]);

        let suffix = &name[56..];
        assert_eq!(suffix.len(), 8);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tool_name_is_deterministic_and_distinguishes_ids() {
        let id_a = format!("{}{}", "x".repeat(60), "aaaa");
        let id_b = format!("{}{}", "x".repeat(60), "bbbb");

        assert_eq!(tool_name(&id_a), tool_name(&id_a));
        // Shared 55-byte prefix, different hashes.
        assert_eq!(tool_name(&id_a)[..55], tool_name(&id_b)[..55]);
        assert_ne!(tool_name(&id_a), tool_name(&id_b));
    }

    #[test]
    fn clean_path_normalises() {
        assert_eq!(clean_path("/pets"), "/pets");
        assert_eq!(clean_path("pets"), "/pets");
        assert_eq!(clean_path("//pets///{petId}"), "/pets/{petId}");
        assert_eq!(clean_path("/pets/./images"), "/pets/images");
        assert_eq!(clean_path("/pets/../users"), "/users");
        assert_eq!(clean_path("/../users"), "/users");
        assert_eq!(clean_path(""), "/");
        assert_eq!(clean_path("/pets/"), "/pets");
    }

    #[test]
    fn path_segment_escaping() {
        assert_eq!(path_segment_escape("special pet"), "special%20pet");
        assert_eq!(path_segment_escape("a,b:c@d"), "a,b:c@d");
        assert_eq!(path_segment_escape("simple-id_1.2~x"), "simple-id_1.2~x");
        assert_eq!(path_segment_escape("a/b"), "a%2Fb");
        assert_eq!(path_segment_escape("a?b#c"), "a%3Fb%23c");
        assert_eq!(path_segment_escape("!$&'()*+,;="), "!$&'()*+,;=");
    }

    #[test]
    fn scalar_text_forms() {
        assert_eq!(scalar_text(&json!("dog")), "dog");
        assert_eq!(scalar_text(&json!(5)), "5");
        assert_eq!(scalar_text(&json!(true)), "true");
        assert_eq!(scalar_text(&json!(1.5)), "1.5");
    }

    #[test]
    fn base_url_scheme_defaults_to_http() {
        let url = parse_base_url("h").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("h"));

        let url = parse_base_url("https://api.example.com/v2").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.path(), "/v2");
    }
}
