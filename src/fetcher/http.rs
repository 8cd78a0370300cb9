//! HTTP JSON fetcher
//!
//! Performs a single GET against a fixed URL and hands back the body bytes
//! after checking the status code and that the body is valid JSON.

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT},
    Client,
};
use std::time::Duration;

use super::{Fetcher, RawPayload};
use crate::utils::error::FetchError;

/// Default timeout for HTTP sources
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-over-HTTP fetcher for a single endpoint
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// HTTP client with configured timeout
    client: Client,

    /// Full endpoint URL (may carry a query string)
    url: String,

    /// Extra query parameters appended to every request
    params: Vec<(String, String)>,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Unreachable` if the HTTP client cannot be created
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(url, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a fetcher with a custom timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Unreachable` if the HTTP client cannot be created
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .default_headers(Self::build_headers())
            .build()
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            params: Vec::new(),
        })
    }

    /// Add a query parameter sent with every request
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET an arbitrary URL with query parameters, returning the raw body
    ///
    /// Used for command-style endpoints where the body is not necessarily JSON.
    pub async fn get_with_params(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<RawPayload, FetchError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Request failed");
            return Err(FetchError::BadStatus(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::BadPayload(e.to_string()))?;

        Ok(RawPayload::new(bytes))
    }

    /// Build default headers for JSON endpoints
    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(agent) = HeaderValue::from_str(&format!("waqt/{}", env!("CARGO_PKG_VERSION"))) {
            headers.insert(USER_AGENT, agent);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        headers
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn describe(&self) -> String {
        format!("GET {}", self.url)
    }

    async fn fetch(&self) -> Result<RawPayload, FetchError> {
        let payload = self.get_with_params(&self.url, &self.params).await?;

        // Reject bodies that are not JSON so they never reach the cache
        payload.json()?;

        tracing::debug!(url = %self.url, bytes = payload.len(), "Fetched payload");
        Ok(payload)
    }
}
