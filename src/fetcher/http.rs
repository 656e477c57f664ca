//! HTTP implementation of [`SourceFetcher`]

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

use super::shared_resources::global_http_client;
use super::{FetcherError, FetcherResult, RawResponse, SourceFetcher};

const DEFAULT_USER_AGENT: &str = concat!("complaint-ingest/", env!("CARGO_PKG_VERSION"));

/// `reqwest`-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpSourceFetcher {
    client: Arc<Client>,
    user_agent: String,
}

impl HttpSourceFetcher {
    /// Create a fetcher on top of an existing client
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Create a fetcher using the process-wide client
    pub fn shared() -> Self {
        Self::new(global_http_client())
    }

    /// Override the `User-Agent` header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, url: &str) -> FetcherResult<RawResponse> {
        let url = reqwest::Url::parse(url).map_err(|e| FetcherError::InvalidUrl(format!("{}: {}", url, e)))?;

        debug!(url = %url, "Fetching window");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(classify_error)?;

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Source returned non-success status");
        }

        Ok(RawResponse::new(status.as_u16(), body))
    }
}

fn classify_error(e: reqwest::Error) -> FetcherError {
    if e.is_timeout() {
        FetcherError::Timeout(e.to_string())
    } else if e.is_connect() || e.is_request() || e.is_body() {
        FetcherError::NetworkError(e.to_string())
    } else {
        FetcherError::HttpError(e.to_string())
    }
}
