//! Specification loading.
//!
//! The positional CLI argument names the specification in one of three
//! ways: a local file path, an HTTP(S) URL, or `"-"` for stdin. Loading
//! produces the raw bytes; parsing them is the job of
//! [`crate::openapi::SpecDocument`].
//!
//! When the specification arrives on stdin, the JSON-RPC input cannot also
//! be stdin, so the transport falls back to the controlling TTY.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::info;
use url::Url;

use crate::error::{LoadError, StartupError};
use crate::http::RetryingClient;

/// Maximum accepted specification file size: 100 MiB.
pub const MAX_SPEC_SIZE: u64 = 100 * 1024 * 1024;

/// Where the specification bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    /// A local file.
    File(PathBuf),
    /// An HTTP(S) URL.
    Url(Url),
    /// Standard input (the `"-"` sentinel).
    Stdin,
}

impl SpecSource {
    /// Classifies the CLI argument.
    ///
    /// # Errors
    ///
    /// Returns an error when the argument starts with an HTTP scheme but is
    /// not a valid URL.
    pub fn parse(arg: &str) -> Result<Self, LoadError> {
        if arg == "-" {
            return Ok(Self::Stdin);
        }

        if arg.starts_with("http://") || arg.starts_with("https://") {
            let url = Url::parse(arg).map_err(|source| LoadError::InvalidUrl {
                url: arg.to_string(),
                source,
            })?;
            return Ok(Self::Url(url));
        }

        Ok(Self::File(PathBuf::from(arg)))
    }

    /// Loads the raw specification bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing, a directory, or over the
    /// size cap; when the download fails or returns a non-success status;
    /// or when reading stdin fails.
    pub async fn load(&self, client: &RetryingClient) -> Result<Vec<u8>, LoadError> {
        match self {
            Self::File(path) => load_file(path).await,
            Self::Url(url) => load_url(url, client).await,
            Self::Stdin => {
                info!("reading spec from stdin");
                let mut data = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut data)
                    .await
                    .map_err(|source| LoadError::Io {
                        source_name: "stdin".to_string(),
                        source,
                    })?;
                Ok(data)
            }
        }
    }

    /// Opens the JSON-RPC input stream.
    ///
    /// Normally stdin; when the specification itself was read from stdin,
    /// the controlling TTY takes its place.
    ///
    /// # Errors
    ///
    /// Returns an error when `/dev/tty` cannot be opened.
    pub async fn rpc_input(&self) -> Result<Box<dyn AsyncRead + Send + Unpin>, StartupError> {
        if *self == Self::Stdin {
            let tty = tokio::fs::File::open("/dev/tty")
                .await
                .map_err(|e| StartupError::RpcInput {
                    message: format!("cannot open /dev/tty: {e}"),
                })?;
            return Ok(Box::new(tty));
        }

        Ok(Box::new(tokio::io::stdin()))
    }
}

async fn load_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    info!(file = %path.display(), "reading spec from file");

    let metadata = tokio::fs::metadata(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                source_name: path.display().to_string(),
                source,
            }
        }
    })?;

    if metadata.is_dir() {
        return Err(LoadError::IsDirectory {
            path: path.to_path_buf(),
        });
    }

    if metadata.len() > MAX_SPEC_SIZE {
        return Err(LoadError::TooLarge {
            path: path.to_path_buf(),
            max: MAX_SPEC_SIZE,
        });
    }

    tokio::fs::read(path).await.map_err(|source| LoadError::Io {
        source_name: path.display().to_string(),
        source,
    })
}

async fn load_url(url: &Url, client: &RetryingClient) -> Result<Vec<u8>, LoadError> {
    info!(%url, "reading spec from URL");

    let response = client
        .get(url.clone())
        .await
        .map_err(|source| LoadError::Download {
            url: url.to_string(),
            source,
        })?;

    if !response.status.is_success() {
        return Err(LoadError::DownloadStatus {
            url: url.to_string(),
            status: response.status.as_u16(),
        });
    }

    Ok(response.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_stdin_sentinel() {
        assert_eq!(SpecSource::parse("-").unwrap(), SpecSource::Stdin);
    }

    #[test]
    fn classify_urls() {
        let source = SpecSource::parse("https://api.example.com/openapi.json").unwrap();
        assert!(matches!(source, SpecSource::Url(_)));

        let source = SpecSource::parse("http://localhost:8080/spec.yaml").unwrap();
        assert!(matches!(source, SpecSource::Url(_)));
    }

    #[test]
    fn classify_file_paths() {
        let source = SpecSource::parse("./openapi.json").unwrap();
        assert_eq!(source, SpecSource::File(PathBuf::from("./openapi.json")));

        // A scheme other than http(s) is treated as a path, not a URL.
        let source = SpecSource::parse("ftp://example.com/spec").unwrap();
        assert!(matches!(source, SpecSource::File(_)));
    }

    #[test]
    fn reject_malformed_url() {
        let err = SpecSource::parse("http://[bad").unwrap_err();
        assert!(matches!(err, LoadError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn load_missing_file() {
        let client = RetryingClient::new(crate::http::ClientOptions::default()).unwrap();
        let source = SpecSource::File(PathBuf::from("/nonexistent/openapi.json"));
        let err = source.load(&client).await.unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[tokio::test]
    async fn load_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let client = RetryingClient::new(crate::http::ClientOptions::default()).unwrap();
        let source = SpecSource::File(dir.path().to_path_buf());
        let err = source.load(&client).await.unwrap_err();
        assert!(matches!(err, LoadError::IsDirectory { .. }));
    }

    #[tokio::test]
    async fn load_oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.json");
        // A sparse file is enough; only the metadata length is checked
        // before reading.
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_SPEC_SIZE + 1).unwrap();

        let client = RetryingClient::new(crate::http::ClientOptions::default()).unwrap();
        let source = SpecSource::File(path);
        let err = source.load(&client).await.unwrap_err();
        assert!(matches!(err, LoadError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn load_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("openapi.json");
        std::fs::write(&path, b"{\"openapi\": \"3.0.0\"}").unwrap();

        let client = RetryingClient::new(crate::http::ClientOptions::default()).unwrap();
        let source = SpecSource::File(path);
        let data = source.load(&client).await.unwrap();
        assert_eq!(data, b"{\"openapi\": \"3.0.0\"}");
    }
}
