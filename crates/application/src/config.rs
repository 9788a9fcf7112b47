//! Client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_domain::DEFAULT_RETRY_AFTER_SECS;

/// Paths of the identity endpoints, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Exchanges username/password for a credential pair.
    pub issue: String,
    /// Exchanges the long-lived credential for a fresh pair.
    pub renew: String,
    /// Invalidates the long-lived credential server-side.
    pub revoke: String,
    /// Returns the signed-in user.
    pub current_user: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            issue: "/identity/tokens".to_string(),
            renew: "/identity/refresh".to_string(),
            revoke: "/identity/revoke-refresh".to_string(),
            current_user: "/identity/users".to_string(),
        }
    }
}

/// Settings for one `ApiClient` instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API base URL, e.g. `https://api.example.com`.
    pub base_url: String,
    /// How long a cached read stays fresh.
    pub cache_ttl_secs: u64,
    /// Wait reported for 429 responses without a usable `Retry-After`.
    pub retry_after_fallback_secs: u64,
    /// Per-request transport timeout.
    pub request_timeout_ms: u64,
    /// Identity endpoint paths.
    pub endpoints: Endpoints,
    /// Durable key holding the long-lived credential.
    pub storage_key: String,
    /// Keys from older client versions, removed on restore.
    pub legacy_storage_keys: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            cache_ttl_secs: 60,
            retry_after_fallback_secs: DEFAULT_RETRY_AFTER_SECS,
            request_timeout_ms: 30_000,
            endpoints: Endpoints::default(),
            storage_key: "refreshToken".to_string(),
            legacy_storage_keys: vec!["token".to_string()],
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Returns the cache TTL as a `Duration`.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Returns the transport timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Joins a path (with query) onto the base URL.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_url_join() {
        let config = ClientConfig::new("https://api.example.com/");
        assert_eq!(
            config.url("/transactions?limit=15"),
            "https://api.example.com/transactions?limit=15"
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"https://x.test","endpoints":{"renew":"/r"}}"#)
                .unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.retry_after_fallback_secs, 60);
        assert_eq!(config.endpoints.renew, "/r");
        assert_eq!(config.endpoints.issue, "/identity/tokens");
        assert_eq!(config.storage_key, "refreshToken");
    }
}
