//! Maps failed responses onto [`ClassifiedError`] and tells the user about them.

use std::sync::Arc;

use tally_domain::{ApiResponse, ClassifiedError, DomainError, ErrorBody, Notice};

use crate::ports::{Notifier, TransportError};

/// Notice shown when an error body has neither known shape.
pub const PARSE_FAILURE_MESSAGE: &str = "Error parsing API Response";

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const ACCESS_FORBIDDEN: &str = "Access forbidden";
const SESSION_EXPIRED: &str = "Session expired, please sign in again";

/// The error for a response plus the notices it should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Error returned to the caller
    pub error: ClassifiedError,
    /// Notices to surface, in order
    pub notices: Vec<Notice>,
}

impl Classification {
    fn single(error: ClassifiedError, message: impl Into<String>) -> Self {
        Self {
            error,
            notices: vec![Notice::error(message)],
        }
    }
}

/// Classifies a non-success response. No side effects.
///
/// `retry_after_fallback_secs` is reported for 429 responses without a
/// usable `Retry-After` header.
#[must_use]
pub fn classify(response: &ApiResponse, retry_after_fallback_secs: u64) -> Classification {
    let status = response.status;
    match status {
        401 => {
            let message = ErrorBody::parse(&response.body)
                .first_message()
                .unwrap_or(INVALID_CREDENTIALS)
                .to_string();
            Classification::single(
                ClassifiedError::Authentication {
                    message: message.clone(),
                },
                message,
            )
        }
        403 => {
            let message = ErrorBody::parse(&response.body)
                .first_message()
                .unwrap_or(ACCESS_FORBIDDEN)
                .to_string();
            Classification::single(
                ClassifiedError::Authorization {
                    message: message.clone(),
                },
                message,
            )
        }
        429 => {
            let retry_after_secs = response
                .retry_after_secs()
                .unwrap_or(retry_after_fallback_secs);
            Classification::single(
                ClassifiedError::RateLimited { retry_after_secs },
                format!("Too many requests. Please wait {retry_after_secs} seconds."),
            )
        }
        400 | 422 => {
            let (messages, notices) = messages_and_notices(&response.body);
            Classification {
                error: ClassifiedError::Validation { messages },
                notices,
            }
        }
        500 => {
            let (messages, notices) = messages_and_notices(&response.body);
            Classification {
                error: ClassifiedError::ServerError { messages },
                notices,
            }
        }
        _ => {
            let message = ErrorBody::parse(&response.body)
                .first_message()
                .map_or_else(|| format!("Unexpected response status {status}"), String::from);
            Classification::single(
                ClassifiedError::Unknown {
                    status: Some(status),
                    message: message.clone(),
                },
                message,
            )
        }
    }
}

/// The error returned once the session cannot be recovered.
#[must_use]
pub fn session_expired() -> ClassifiedError {
    ClassifiedError::Authentication {
        message: SESSION_EXPIRED.to_string(),
    }
}

fn messages_and_notices(body: &[u8]) -> (Vec<String>, Vec<Notice>) {
    let parsed = ErrorBody::parse(body);
    if parsed.is_unrecognized() {
        return (Vec::new(), vec![Notice::error(PARSE_FAILURE_MESSAGE)]);
    }
    let messages = parsed.messages();
    let notices = messages.iter().cloned().map(Notice::error).collect();
    (messages, notices)
}

/// Classifies failures and forwards every resulting notice to the notifier.
pub struct ErrorClassifier {
    notifier: Arc<dyn Notifier>,
    retry_after_fallback_secs: u64,
}

impl std::fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("retry_after_fallback_secs", &self.retry_after_fallback_secs)
            .finish_non_exhaustive()
    }
}

impl ErrorClassifier {
    /// Creates a classifier reporting through `notifier`.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, retry_after_fallback_secs: u64) -> Self {
        Self {
            notifier,
            retry_after_fallback_secs,
        }
    }

    /// Classifies a non-success response.
    pub fn classify_response(&self, response: &ApiResponse) -> ClassifiedError {
        let classification = classify(response, self.retry_after_fallback_secs);
        tracing::debug!(
            status = response.status,
            kind = ?classification.error.kind(),
            "Request failed"
        );
        self.surface(classification)
    }

    /// Classifies a request that got no response.
    pub fn classify_transport(&self, error: &TransportError) -> ClassifiedError {
        let message = error.to_string();
        tracing::warn!(error = %message, "Request did not reach the server");
        self.surface(Classification::single(
            ClassifiedError::NetworkError {
                message: message.clone(),
            },
            message,
        ))
    }

    /// Classifies a success body that did not decode into the expected type.
    pub fn classify_decode(&self, error: &serde_json::Error) -> ClassifiedError {
        tracing::warn!(error = %error, "Response body did not decode");
        self.surface(Classification::single(
            ClassifiedError::Unknown {
                status: None,
                message: error.to_string(),
            },
            PARSE_FAILURE_MESSAGE,
        ))
    }

    /// Classifies a request rejected before it was sent.
    pub fn classify_invalid_request(&self, error: &DomainError) -> ClassifiedError {
        let message = error.to_string();
        self.surface(Classification::single(
            ClassifiedError::Unknown {
                status: None,
                message: message.clone(),
            },
            message,
        ))
    }

    /// Reports that the session cannot be recovered.
    pub fn session_expired(&self) -> ClassifiedError {
        self.surface(Classification::single(session_expired(), SESSION_EXPIRED))
    }

    fn surface(&self, classification: Classification) -> ClassifiedError {
        for notice in classification.notices {
            self.notifier.notify(notice);
        }
        classification.error
    }
}
