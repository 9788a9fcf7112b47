//! HTTP transport port

use async_trait::async_trait;
use tally_domain::{ApiResponse, Headers, HttpMethod};
use thiserror::Error;

/// A fully-resolved request ready to be put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// Headers to send
    pub headers: Headers,
    /// Serialized JSON body
    pub body: Option<String>,
}

/// Failures where no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Could not establish a connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete in time.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Port for executing HTTP requests.
///
/// Implementations return `Ok` for every response received, whatever its
/// status; only failures to obtain a response are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request and returns the raw response.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` when no response was received.
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse, TransportError>;
}
