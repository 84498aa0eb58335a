//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP specification for exposing the operations
//! of an OpenAPI document as tools to AI assistants. The server communicates
//! over stdio transport using JSON-RPC 2.0 messages.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │   ┌─────────────┐    ┌─────────────┐    ┌───────────────┐    │
//! │   │  Transport  │───▶│   Server    │───▶│ HTTP dispatch │    │
//! │   │   (stdio)   │    │ (projection │    │  (reqwest +   │    │
//! │   └─────────────┘    │ +invocation)│    │   retries)    │    │
//! │          │           └─────────────┘    └───────────────┘    │
//! │          ▼                  │                                │
//! │   ┌──────────────────────────────────────────────────┐       │
//! │   │               JSON-RPC Messages                  │       │
//! │   └──────────────────────────────────────────────────┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod transport;
pub mod types;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::Server;
pub use transport::{RequestHandler, StdioTransport};
