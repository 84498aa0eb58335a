//! openapi-bridge-mcp: an MCP server for any OpenAPI 3.x specification.
//!
//! This library turns an OpenAPI document into a Model Context Protocol
//! server over stdio: every operation with an `operationId` is projected as
//! an MCP tool, and calling a tool issues the corresponding HTTP request
//! and returns the response as typed content (text, JSON, or base64 image).
//!
//! # Modules
//!
//! - [`config`] — Operation filter configuration
//! - [`error`] — Start-up error types
//! - [`http`] — HTTP dispatch: auth, retries, rate limiting
//! - [`loader`] — Specification loading (file, URL, stdin)
//! - [`mcp`] — MCP protocol: JSON-RPC model, router, stdio transport
//! - [`openapi`] — Read-only OpenAPI object model
//! - [`secret`] — 1Password secret reference resolution

pub mod config;
pub mod error;
pub mod http;
pub mod loader;
pub mod mcp;
pub mod openapi;
pub mod secret;
