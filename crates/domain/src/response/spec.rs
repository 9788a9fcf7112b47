//! Response specification type

use crate::request::Headers;

/// Raw response as received from the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Raw response body
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Creates a response from its parts.
    #[must_use]
    pub const fn new(status: u16, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Creates a response with a JSON body and no headers.
    #[must_use]
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, Headers::new(), body.to_string().into_bytes())
    }

    /// Returns true if the status code indicates success (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns true if there is no payload to decode.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status == 204 || self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Parses the `Retry-After` header as a whole number of seconds.
    ///
    /// HTTP-date values are not supported and yield `None`.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.headers
            .get("Retry-After")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the body is not valid JSON.
    pub fn json_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
