//! Request specification type

use serde::{Deserialize, Serialize};

use super::HttpMethod;
use crate::error::{DomainError, DomainResult};

/// One logical request against the resource API.
///
/// `path` is relative to the configured base URL and includes the query
/// string, so `/transactions?limit=15` and `/transactions?limit=30` are
/// distinct requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Path and query, relative to the API base URL
    pub path: String,
    /// JSON body, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Do not attach the short-lived credential (credential-issuing calls)
    #[serde(default)]
    pub skip_credential: bool,
}

impl ApiRequest {
    /// Creates a request without a body.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            skip_credential: false,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Creates a PUT request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// Creates a PATCH request.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    /// Creates a DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Attaches an already-built JSON body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `body` and attaches it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidBody` if the value cannot be represented as JSON.
    pub fn with_json<T: Serialize>(self, body: &T) -> DomainResult<Self> {
        let value =
            serde_json::to_value(body).map_err(|e| DomainError::InvalidBody(e.to_string()))?;
        Ok(self.with_body(value))
    }

    /// Marks the request as one that must go out without a credential.
    #[must_use]
    pub const fn without_credential(mut self) -> Self {
        self.skip_credential = true;
        self
    }

    /// Returns whether the response may be served from and stored in the cache.
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        self.method.is_cacheable()
    }

    /// Request identity used as the response cache key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Checks that the path is relative to the API base.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPath` for empty paths or paths not starting with `/`.
    pub fn validate(&self) -> DomainResult<()> {
        if self.path.trim().is_empty() || !self.path.starts_with('/') {
            return Err(DomainError::InvalidPath(self.path.clone()));
        }
        Ok(())
    }
}
