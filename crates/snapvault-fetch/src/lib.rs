//! HTTP fetch collaborator for the snapshot cache.
//!
//! Implements [`Fetcher`] over `reqwest`: a single GET per resource with
//! sensible defaults (User-Agent, Accept, timeout) and bounded retry with
//! exponential backoff for transient failures. Retry and backoff live here
//! by design; the cache core propagates failures without retrying.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use tracing::{debug, warn};

use snapvault_core::{FetchError, FetchedPayload, Fetcher};

/// User agent for snapshot fetches.
const USER_AGENT_VALUE: &str = concat!("snapvault-fetch/", env!("CARGO_PKG_VERSION"));

/// Placeholder replaced with the resource identifier in URL templates.
const RESOURCE_PLACEHOLDER: &str = "{resource}";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// HTTP-backed [`Fetcher`].
///
/// The URL template maps a logical resource identifier onto a concrete URL:
/// `{resource}` is substituted when present, otherwise the identifier is
/// appended as a path segment.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    url_template: String,
    max_retries: u32,
}

impl HttpFetcher {
    /// Create a fetcher for a URL template with default timeout and retries.
    pub fn new(url_template: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(url_template, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with an explicit request timeout.
    pub fn with_timeout(
        url_template: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        default_headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| FetchError::transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url_template: url_template.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Override the retry budget for transient failures.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Concrete URL for a resource identifier.
    pub fn url_for(&self, resource: &str) -> String {
        if self.url_template.contains(RESOURCE_PLACEHOLDER) {
            self.url_template.replace(RESOURCE_PLACEHOLDER, resource)
        } else {
            format!("{}/{}", self.url_template.trim_end_matches('/'), resource)
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPayload, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(
                status.as_u16(),
                format!("GET {url}: HTTP {status}"),
            ));
        }

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(format!("reading body of {url}: {e}")))?;

        debug!(url, bytes = body.len(), "fetched resource");

        let mut payload = FetchedPayload::new(body);
        if let Some(mt) = media_type {
            payload = payload.with_media_type(mt);
        }
        Ok(payload)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, resource: &str) -> Result<FetchedPayload, FetchError> {
        let url = self.url_for(resource);
        let mut retries = 0u32;

        loop {
            match self.fetch_once(&url).await {
                Ok(payload) => return Ok(payload),
                Err(e) if e.retryable && retries < self.max_retries => {
                    retries += 1;
                    let backoff =
                        Duration::from_secs(1u64 << retries.min(5)).min(MAX_BACKOFF);
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));

                    warn!(
                        url,
                        retry = retries,
                        max_retries = self.max_retries,
                        backoff_secs = backoff.as_secs(),
                        "retrying fetch"
                    );
                    tokio::time::sleep(backoff + jitter).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
