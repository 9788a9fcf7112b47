//! Classified request failures and the error body shapes they are built from.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default wait when a 429 response carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Stable taxonomy of request failures returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifiedError {
    /// Credentials were rejected or the session could not be recovered.
    #[error("authentication error: {message}")]
    Authentication {
        /// Human-readable reason.
        message: String,
    },

    /// The credential is valid but lacks permission.
    #[error("authorization error: {message}")]
    Authorization {
        /// Human-readable reason.
        message: String,
    },

    /// The server asked the client to slow down.
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The request was rejected by server-side validation.
    #[error("validation error: {}", .messages.join("; "))]
    Validation {
        /// Messages in the order the server reported them.
        messages: Vec<String>,
    },

    /// The server failed to process the request.
    #[error("server error: {}", .messages.join("; "))]
    ServerError {
        /// Messages extracted from the body, possibly empty.
        messages: Vec<String>,
    },

    /// No response was received.
    #[error("network error: {message}")]
    NetworkError {
        /// Transport-level description.
        message: String,
    },

    /// Anything not covered above.
    #[error("unexpected response: {message}")]
    Unknown {
        /// Status code, if a response was received.
        status: Option<u16>,
        /// Human-readable description.
        message: String,
    },
}

impl ClassifiedError {
    /// Returns the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::NetworkError { .. } => ErrorKind::NetworkError,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Returns the server-suggested wait, for rate-limit errors.
    #[must_use]
    pub const fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Fieldless category of a [`ClassifiedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`ClassifiedError::Authentication`].
    Authentication,
    /// See [`ClassifiedError::Authorization`].
    Authorization,
    /// See [`ClassifiedError::RateLimited`].
    RateLimited,
    /// See [`ClassifiedError::Validation`].
    Validation,
    /// See [`ClassifiedError::ServerError`].
    ServerError,
    /// See [`ClassifiedError::NetworkError`].
    NetworkError,
    /// See [`ClassifiedError::Unknown`].
    Unknown,
}

impl ErrorKind {
    /// Returns a human-readable title for this error type.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Authentication => "Authentication Error",
            Self::Authorization => "Authorization Error",
            Self::RateLimited => "Rate Limited",
            Self::Validation => "Client Error",
            Self::ServerError => "Server Error",
            Self::NetworkError => "Network Error",
            Self::Unknown => "Unknown Error",
        }
    }
}

/// One entry of an error body: `{"message": ..., "detail": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    /// Human-readable message
    pub message: String,
    /// Optional structured detail (`{"path", "type"}` in practice)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ErrorDetail>,
}

/// Location and category of a single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Field path the error refers to
    #[serde(default)]
    pub path: Option<String>,
    /// Error category reported by the server
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// The body shapes an error response may carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    /// `{"message": ..., "detail": ...}`
    Single(ErrorResult),
    /// `{"result": [{"message": ..., "detail": ...}, ...]}`
    Multiple(Vec<ErrorResult>),
    /// Not JSON, or JSON of neither known shape.
    Unrecognized,
}

#[derive(Deserialize)]
struct MultipleShape {
    result: Vec<ErrorResult>,
}

impl ErrorBody {
    /// Determines which known shape `body` has.
    ///
    /// A `result` key selects the list shape; otherwise a `message` key
    /// selects the single shape. Entries whose `detail` does not match the
    /// expected structure make the whole body unrecognized.
    #[must_use]
    pub fn parse(body: &[u8]) -> Self {
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
            return Self::Unrecognized;
        };
        if !value.is_object() {
            return Self::Unrecognized;
        }

        if value.get("result").is_some() {
            return serde_json::from_value::<MultipleShape>(value)
                .map_or(Self::Unrecognized, |shape| Self::Multiple(shape.result));
        }
        if value.get("message").is_some() {
            return serde_json::from_value::<ErrorResult>(value)
                .map_or(Self::Unrecognized, Self::Single);
        }
        Self::Unrecognized
    }

    /// Returns every message in body order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Single(result) => vec![result.message.clone()],
            Self::Multiple(results) => results.iter().map(|r| r.message.clone()).collect(),
            Self::Unrecognized => Vec::new(),
        }
    }

    /// Returns the first non-empty message, if any.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        match self {
            Self::Single(result) => Some(result.message.as_str()),
            Self::Multiple(results) => results.first().map(|r| r.message.as_str()),
            Self::Unrecognized => None,
        }
        .filter(|m| !m.is_empty())
    }

    /// Returns true if neither known shape matched.
    #[must_use]
    pub const fn is_unrecognized(&self) -> bool {
        matches!(self, Self::Unrecognized)
    }
}
