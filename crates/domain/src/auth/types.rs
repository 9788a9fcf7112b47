//! Credential and session types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Short-lived and long-lived credentials as issued by the identity endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    /// Memory-only credential attached to every request
    pub access_token: String,
    /// Durable credential used solely to obtain a new pair
    pub refresh_token: String,
}

impl CredentialPair {
    /// Creates a new credential pair.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

/// Formats a short-lived credential as a bearer Authorization header value.
#[must_use]
pub fn bearer(access_token: &str) -> String {
    format!("Bearer {access_token}")
}

/// Body of the credential-issue call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInRequest {
    /// Account name
    pub username: String,
    /// Account password
    pub password: String,
}

impl fmt::Debug for SignInRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Body of the credential-renew call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewRequest {
    /// The long-lived credential
    pub refresh_token: String,
}

/// Body of the credential-revoke call. Same shape as the renewal body.
pub type RevokeRequest = RenewRequest;

impl fmt::Debug for RenewRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenewRequest")
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

fn redact(token: &str) -> String {
    if token.len() > 12 {
        format!("{}...", token.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}

/// Lifecycle state of the single client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No short-lived credential held.
    #[default]
    Anonymous,
    /// A short-lived credential is held.
    Authenticated,
    /// A renewal is in flight.
    Refreshing,
    /// The long-lived credential was rejected; only a new sign-in recovers.
    PermanentlyFailed,
}

impl SessionState {
    /// Returns a user-friendly description.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Anonymous => "Not signed in",
            Self::Authenticated => "Signed in",
            Self::Refreshing => "Renewing session...",
            Self::PermanentlyFailed => "Session expired, sign in again",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
