//! Read-only OpenAPI 3.x object model.
//!
//! This module parses a specification document (JSON or YAML) into the
//! subset of the v3 object model the bridge needs: servers, ordered paths,
//! the five projectable operations per path item (HEAD and OPTIONS are
//! intentionally absent), parameters, and inline schemas.
//!
//! The model is built once at construction and never mutated afterwards, so
//! tool projection and invocation can read it concurrently without locking.
//!
//! Ordering matters: `paths` and schema `properties` preserve declaration
//! order, which keeps `tools/list` output stable across calls.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::SpecError;

/// The HTTP methods that are projected as tools, in projection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
}

impl HttpMethod {
    /// Projection order: GET, POST, PUT, DELETE, PATCH.
    pub const ALL: [Self; 5] = [Self::Get, Self::Post, Self::Put, Self::Delete, Self::Patch];

    /// Returns the method as an uppercase token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed OpenAPI document.
#[derive(Debug, Deserialize)]
pub struct SpecDocument {
    /// Declared server list; the first entry supplies the base URL.
    #[serde(default)]
    pub servers: Vec<Server>,

    /// Path items in declaration order.
    #[serde(default)]
    pub paths: IndexMap<String, PathItem>,
}

/// A single `servers[]` entry.
#[derive(Debug, Deserialize)]
pub struct Server {
    /// The server URL.
    #[serde(default)]
    pub url: String,
}

/// A path item: up to five operations plus shared parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PathItem {
    /// GET operation.
    pub get: Option<Operation>,
    /// POST operation.
    pub post: Option<Operation>,
    /// PUT operation.
    pub put: Option<Operation>,
    /// DELETE operation.
    pub delete: Option<Operation>,
    /// PATCH operation.
    pub patch: Option<Operation>,

    /// Parameters shared by every operation under this path.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl PathItem {
    /// Returns the operation for `method`, if declared.
    #[must_use]
    pub const fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
        }
    }
}

/// A single operation under a path item.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// The operation identifier. Operations with an empty identifier are
    /// never projected as tools.
    #[serde(default)]
    pub operation_id: String,

    /// Short summary, used as the tool description fallback.
    #[serde(default)]
    pub summary: String,

    /// Long description, preferred as the tool description.
    #[serde(default)]
    pub description: String,

    /// Operation-level parameters.
    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Declared request body.
    pub request_body: Option<RequestBody>,
}

impl Operation {
    /// Returns the `application/json` request body schema, if declared.
    #[must_use]
    pub fn json_body_schema(&self) -> Option<&Schema> {
        self.request_body
            .as_ref()
            .and_then(|body| body.content.get("application/json"))
            .and_then(|media| media.schema.as_ref())
    }
}

/// Where a parameter is bound in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ParameterLocation {
    /// Substituted into the URL path.
    Path,
    /// Appended to the query string.
    Query,
    /// Added as an HTTP header.
    Header,
    /// Cookie and unknown locations are parsed but never bound.
    Other,
}

impl From<String> for ParameterLocation {
    fn from(location: String) -> Self {
        match location.as_str() {
            "path" => Self::Path,
            "query" => Self::Query,
            "header" => Self::Header,
            _ => Self::Other,
        }
    }
}

/// A path, query, or header parameter.
#[derive(Debug, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,

    /// Binding location.
    #[serde(rename = "in")]
    pub location: ParameterLocation,

    /// Whether the parameter must be supplied.
    #[serde(default)]
    pub required: bool,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Parameter schema. Parameters without a schema are not projected.
    pub schema: Option<Schema>,
}

/// A declared request body.
#[derive(Debug, Deserialize)]
pub struct RequestBody {
    /// Media types by name; only `application/json` is consulted.
    #[serde(default)]
    pub content: IndexMap<String, MediaType>,
}

/// A media type entry in a request body.
#[derive(Debug, Deserialize)]
pub struct MediaType {
    /// Schema of the payload.
    pub schema: Option<Schema>,
}

/// The `type` keyword: a single keyword in 3.0, an array in 3.1.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    /// A single type keyword.
    One(String),
    /// An array of type keywords; the first entry wins.
    Many(Vec<String>),
}

impl SchemaType {
    /// Returns the first type keyword, if any.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(keyword) => Some(keyword),
            Self::Many(keywords) => keywords.first().map(String::as_str),
        }
    }
}

/// An inline schema.
#[derive(Debug, Default, Deserialize)]
pub struct Schema {
    /// Type keyword(s).
    #[serde(rename = "type")]
    pub schema_type: Option<SchemaType>,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Regular-expression pattern constraint.
    pub pattern: Option<String>,

    /// Object properties in declaration order.
    #[serde(default)]
    pub properties: IndexMap<String, Schema>,

    /// Required property names.
    #[serde(default)]
    pub required: Vec<String>,
}

impl Schema {
    /// Returns the first type keyword, defaulting to `"string"`.
    #[must_use]
    pub fn type_or_default(&self) -> &str {
        self.schema_type
            .as_ref()
            .and_then(SchemaType::first)
            .unwrap_or("string")
    }
}

/// A resolved `(method, path, operation, pathItem)` tuple.
#[derive(Debug, Clone, Copy)]
pub struct OperationRef<'a> {
    /// HTTP method of the operation.
    pub method: HttpMethod,
    /// Path template the operation is declared under.
    pub path: &'a str,
    /// The operation itself.
    pub operation: &'a Operation,
    /// The owning path item (source of shared parameters).
    pub path_item: &'a PathItem,
}

impl SpecDocument {
    /// Parses a specification from raw bytes.
    ///
    /// JSON is attempted first; anything that is not valid JSON is parsed
    /// as YAML. The document must declare at least one non-empty server URL.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Parse`] when neither parse succeeds and
    /// [`SpecError::NoServerUrl`] when the server list is empty or the first
    /// URL is blank.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SpecError> {
        let document: Self = match serde_json::from_slice(bytes) {
            Ok(document) => document,
            Err(json_error) => {
                serde_yaml::from_slice(bytes).map_err(|yaml_error| SpecError::Parse {
                    message: format!("not valid JSON ({json_error}) or YAML ({yaml_error})"),
                })?
            }
        };

        if document.servers.first().map_or(true, |s| s.url.is_empty()) {
            return Err(SpecError::NoServerUrl);
        }

        Ok(document)
    }

    /// Returns the base URL: the first server URL with one trailing slash
    /// stripped.
    #[must_use]
    pub fn base_url(&self) -> &str {
        let url = self
            .servers
            .first()
            .map_or("", |server| server.url.as_str());
        url.strip_suffix('/').unwrap_or(url)
    }

    /// Iterates every declared operation in path declaration order, with
    /// the fixed method order GET, POST, PUT, DELETE, PATCH per path.
    pub fn operations(&self) -> impl Iterator<Item = OperationRef<'_>> {
        self.paths.iter().flat_map(|(path, path_item)| {
            HttpMethod::ALL.into_iter().filter_map(move |method| {
                path_item.operation(method).map(|operation| OperationRef {
                    method,
                    path,
                    operation,
                    path_item,
                })
            })
        })
    }
}
