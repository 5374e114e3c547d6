//! Fetch collaborator seam.
//!
//! The cache never performs network I/O itself. On a miss the session hands
//! the resource identifier to a [`Fetcher`] and persists whatever comes back.
//! Rate limiting, client identity, retries, and timeouts all live behind this
//! trait; failures cross back over it unchanged.

use async_trait::async_trait;
use bytes::Bytes;

/// Raw payload returned by a fetch collaborator.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    /// Response body, opaque to the cache.
    pub body: Bytes,

    /// Media type of the body, if the transport reported one.
    pub media_type: Option<String>,
}

impl FetchedPayload {
    /// Wrap a body with no media type.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            media_type: None,
        }
    }

    /// Attach a media type.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

/// Failure reported by a fetch collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    /// Human-readable description of what went wrong.
    pub message: String,

    /// HTTP status code, when the failure came from an HTTP response.
    pub status: Option<u16>,

    /// Whether the collaborator considers the failure transient.
    pub retryable: bool,
}

impl FetchError {
    /// A transport-level failure (connection refused, timeout, DNS).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            retryable: true,
        }
    }

    /// A failure derived from an HTTP status code.
    /// 429 and 5xx are considered transient.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            retryable: status == 429 || (500..600).contains(&status),
        }
    }
}

/// External collaborator that resolves a resource identifier to raw bytes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the raw payload for a logical resource identifier.
    async fn fetch(&self, resource: &str) -> Result<FetchedPayload, FetchError>;
}
