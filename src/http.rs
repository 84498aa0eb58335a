//! HTTP dispatch for tool invocations.
//!
//! The invocation engine hands a fully-assembled request to an injected
//! [`HttpDispatch`] and gets the buffered response back. The production
//! implementation, [`RetryingClient`], wraps reqwest and owns the concerns
//! the engine must stay free of: the `Authorization` header, per-request
//! timeout, bounded retries with exponential backoff, and requests-per-second
//! pacing.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{AuthError, HttpError};

/// An outbound HTTP request, fully assembled by the invocation engine.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Final request URL, query string included.
    pub url: Url,
    /// Request headers (may be multi-valued).
    pub headers: HeaderMap,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
}

/// A buffered HTTP response.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// The full response body.
    pub body: Vec<u8>,
}

impl OutboundResponse {
    /// Returns the `Content-Type` header as a string, if present and valid.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// The seam between the invocation engine and the network.
#[async_trait]
pub trait HttpDispatch: Send + Sync {
    /// Executes the request and buffers the full response body.
    ///
    /// # Errors
    ///
    /// Returns an error when the request could not be completed after the
    /// implementation's retry policy is exhausted.
    async fn execute(&self, request: OutboundRequest) -> Result<OutboundResponse, HttpError>;
}

/// How the `Authorization` header is shaped from a CLI-supplied value.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// `Bearer <token>`.
    Bearer(String),
    /// `Basic <credentials>`; `user:pass` values are base64-encoded first.
    Basic(String),
    /// The value is used verbatim.
    Raw(String),
}

impl AuthScheme {
    /// Produces the `Authorization` header value for this scheme.
    ///
    /// # Errors
    ///
    /// Returns an error if the shaped value is not a valid header value.
    pub fn header_value(&self) -> Result<HeaderValue, AuthError> {
        let shaped = match self {
            Self::Bearer(token) => format!("Bearer {token}"),
            // A value containing ':' is user:pass and still needs encoding;
            // anything else is assumed to be base64 already.
            Self::Basic(value) if value.contains(':') => {
                format!("Basic {}", BASE64_STANDARD.encode(value))
            }
            Self::Basic(value) => format!("Basic {value}"),
            Self::Raw(value) => value.clone(),
        };

        let mut header = HeaderValue::from_str(&shaped)
            .map_err(|source| AuthError::InvalidHeader { source })?;
        header.set_sensitive(true);
        Ok(header)
    }
}

/// Options for [`RetryingClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Maximum number of retries after the first attempt.
    pub retries: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum requests per second; `0` disables pacing.
    pub rps: u32,
    /// Optional `Authorization` header added to every request.
    pub auth: Option<HeaderValue>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            timeout: Duration::from_secs(60),
            rps: 0,
            auth: None,
        }
    }
}

/// Spaces requests out to at most one per interval.
#[derive(Debug)]
struct Pacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(rps: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / rps,
            last: Mutex::new(None),
        }
    }

    async fn pace(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// A retrying, rate-limited HTTP client.
pub struct RetryingClient {
    inner: reqwest::Client,
    auth: Option<HeaderValue>,
    retries: u32,
    pacer: Option<Pacer>,
}

impl RetryingClient {
    /// Creates a client from the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client cannot be built.
    pub fn new(options: ClientOptions) -> Result<Self, HttpError> {
        let inner = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|source| HttpError::Build { source })?;

        Ok(Self {
            inner,
            auth: options.auth,
            retries: options.retries,
            pacer: (options.rps > 0).then(|| Pacer::new(options.rps)),
        })
    }

    /// Issues a bare GET, used to download the specification itself.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails after retries.
    pub async fn get(&self, url: Url) -> Result<OutboundResponse, HttpError> {
        self.execute(OutboundRequest {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        })
        .await
    }

    /// Whether a response status warrants another attempt.
    fn should_retry(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Exponential backoff, capped at ten seconds.
    fn backoff(attempt: u32) -> Duration {
        let exp = Duration::from_millis(500) * 2u32.saturating_pow(attempt);
        exp.min(Duration::from_secs(10))
    }
}

#[async_trait]
impl HttpDispatch for RetryingClient {
    async fn execute(&self, request: OutboundRequest) -> Result<OutboundResponse, HttpError> {
        let mut attempt = 0;

        loop {
            if let Some(pacer) = &self.pacer {
                pacer.pace().await;
            }

            let mut builder = self
                .inner
                .request(request.method.clone(), request.url.clone())
                .headers(request.headers.clone());
            if let Some(auth) = &self.auth {
                builder = builder.header(AUTHORIZATION, auth.clone());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if Self::should_retry(status) && attempt < self.retries {
                        attempt += 1;
                        warn!(%status, attempt, url = %request.url, "retrying request");
                        tokio::time::sleep(Self::backoff(attempt)).await;
                        continue;
                    }

                    let headers = response.headers().clone();
                    let body = response
                        .bytes()
                        .await
                        .map_err(|source| HttpError::Request {
                            url: request.url.to_string(),
                            source,
                        })?
                        .to_vec();

                    debug!(%status, bytes = body.len(), url = %request.url, "request completed");
                    return Ok(OutboundResponse {
                        status,
                        headers,
                        body,
                    });
                }
                Err(source) if attempt < self.retries => {
                    attempt += 1;
                    warn!(error = %source, attempt, url = %request.url, "retrying request");
                    tokio::time::sleep(Self::backoff(attempt)).await;
                }
                Err(source) => {
                    return Err(HttpError::Request {
                        url: request.url.to_string(),
                        source,
                    });
                }
            }
        }
    }
}
