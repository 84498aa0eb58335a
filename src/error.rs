//! Error types for openapi-bridge-mcp.
//!
//! These cover everything that can go wrong *before* the server accepts its
//! first RPC: loading the specification, parsing it, shaping credentials,
//! reading the filter configuration, and building the HTTP client. Wire-level
//! failures are not represented here; those are JSON-RPC error responses
//! (see [`crate::mcp::protocol`]).

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while parsing an OpenAPI document.
#[derive(Error, Debug)]
pub enum SpecError {
    /// The bytes are neither valid JSON nor valid YAML for the v3 model.
    #[error("failed to parse OpenAPI specification: {message}")]
    Parse {
        /// Description of the underlying parse failure.
        message: String,
    },

    /// The specification declares no usable server URL.
    #[error("OpenAPI specification must include at least one server URL")]
    NoServerUrl,
}

/// Errors produced while obtaining the raw specification bytes.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The given path does not exist.
    #[error("spec file does not exist: {path}")]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The given path is a directory.
    #[error("specified path is a directory, not a file: {path}")]
    IsDirectory {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The file exceeds the size cap.
    #[error("spec file too large (max {max} bytes): {path}")]
    TooLarge {
        /// Path that was looked up.
        path: PathBuf,
        /// Maximum accepted size in bytes.
        max: u64,
    },

    /// Reading from the filesystem or stdin failed.
    #[error("failed to read specification from {source_name}")]
    Io {
        /// Human-readable description of the input.
        source_name: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The spec argument looked like a URL but did not parse as one.
    #[error("invalid spec URL: {url}")]
    InvalidUrl {
        /// The offending argument.
        url: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// Downloading the specification failed.
    #[error("failed to download specification from {url}")]
    Download {
        /// The spec URL.
        url: String,
        /// The underlying HTTP error.
        #[source]
        source: HttpError,
    },

    /// The spec endpoint answered with a non-success status.
    #[error("spec download from {url} returned HTTP {status}")]
    DownloadStatus {
        /// The spec URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
}

/// Errors produced while shaping the `Authorization` header.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The shaped value is not a valid HTTP header value.
    #[error("auth value is not a valid header value")]
    InvalidHeader {
        /// The underlying header error.
        #[source]
        source: reqwest::header::InvalidHeaderValue,
    },

    /// Resolving a secret reference failed.
    #[error(transparent)]
    Secret(#[from] SecretError),
}

/// Errors produced while resolving an `op://` secret reference.
#[derive(Error, Debug)]
pub enum SecretError {
    /// The 1Password CLI could not be executed.
    #[error("1Password CLI (op) could not be run")]
    CliUnavailable {
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The CLI ran but reported a failure.
    #[error("failed to read secret from 1Password: {stderr}")]
    ReadFailed {
        /// Trimmed stderr output from the CLI.
        stderr: String,
    },
}

/// Errors raised while loading the operation filter configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The filter file could not be read off disk.
    #[error("cannot read filter config {path}")]
    Io {
        /// The file named by `--config`.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The filter file is not valid JSON for the filter schema.
    #[error("filter config {path} does not match the filter schema")]
    Json {
        /// The file named by `--config`.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A disabled-path entry is not a usable regular expression.
    #[error("disabled-path pattern '{pattern}' does not compile")]
    Pattern {
        /// The offending pattern, verbatim from the file.
        pattern: String,
        /// The regex compiler's complaint.
        #[source]
        source: regex::Error,
    },
}

/// Errors produced by the HTTP client collaborator.
#[derive(Error, Debug)]
pub enum HttpError {
    /// The underlying reqwest client could not be constructed.
    #[error("failed to build HTTP client")]
    Build {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The request failed after all retries were exhausted.
    #[error("request to {url} failed")]
    Request {
        /// The request URL.
        url: String,
        /// The final reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

/// Aggregate error for server start-up.
///
/// Everything in here is fatal: the process exits nonzero without accepting
/// a single RPC.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Specification parsing failed.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Specification loading failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Credential shaping failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Filter configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// HTTP client construction failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The RPC input could not be opened.
    #[error("failed to open RPC input: {message}")]
    RpcInput {
        /// Description of the failure.
        message: String,
    },

    /// The stdio transport failed.
    #[error("transport I/O failed")]
    Transport {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_display() {
        let error = LoadError::NotFound {
            path: PathBuf::from("/path/to/openapi.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("does not exist"));
        assert!(msg.contains("openapi.json"));
    }

    #[test]
    fn too_large_display_includes_cap() {
        let error = LoadError::TooLarge {
            path: PathBuf::from("/big.yaml"),
            max: 104_857_600,
        };
        assert!(error.to_string().contains("104857600"));
    }

    #[test]
    fn spec_error_display() {
        let error = SpecError::NoServerUrl;
        assert!(error.to_string().contains("server URL"));
    }

    #[test]
    fn config_error_display_names_the_pattern() {
        let source = regex::Regex::new("[").unwrap_err();
        let error = ConfigError::Pattern {
            pattern: "[".to_string(),
            source,
        };
        assert!(error.to_string().contains("'['"));
    }
}
