//! Source fetch capability
//!
//! The ingestion core only needs `fetch(url) -> {status, body} | error`. Anything
//! beyond that (TLS, timeouts, auth) lives behind [`SourceFetcher`].

use async_trait::async_trait;
use bytes::Bytes;

pub mod http;
pub mod shared_resources;
pub mod template;

pub use http::HttpSourceFetcher;
pub use template::SourceUrlTemplate;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Request could not be built or sent
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Connection-level failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Request exceeded the client timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// URL rejected before sending
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Raw response returned by a fetch capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Unmodified response body
    pub body: Bytes,
}

impl RawResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to GET a URL
///
/// Non-2xx responses are returned as [`RawResponse`] values, not errors, so
/// the caller can quarantine the body. Only transport failures are `Err`.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch `url` and return the raw response
    async fn fetch(&self, url: &str) -> FetcherResult<RawResponse>;
}
