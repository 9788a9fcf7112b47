//! Single-flight credential renewal.
//!
//! Every caller that finds the short-lived credential rejected calls
//! [`RefreshCoordinator::renew`]. The first one starts the renewal call; the
//! rest attach to the same pending outcome.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tally_domain::{CredentialPair, Envelope, HttpMethod, RenewRequest};

use super::TokenStore;
use crate::gateway::json_headers;
use crate::ports::{HttpTransport, OutgoingRequest};

type RenewalHandle = Shared<BoxFuture<'static, bool>>;

struct Inner {
    tokens: Arc<TokenStore>,
    transport: Arc<dyn HttpTransport>,
    renew_url: String,
    in_flight: Mutex<Option<RenewalHandle>>,
}

/// Coordinates renewals of the session's credential pair.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("renew_url", &self.inner.renew_url)
            .field("renewing", &self.is_renewing())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    /// Creates a coordinator that renews through `renew_url`.
    #[must_use]
    pub fn new(
        tokens: Arc<TokenStore>,
        transport: Arc<dyn HttpTransport>,
        renew_url: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tokens,
                transport,
                renew_url: renew_url.into(),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Obtains a fresh credential pair, sharing any renewal already in flight.
    ///
    /// Returns `true` if a new pair was installed. The renewal runs on its own
    /// task, so dropping the returned future does not abort it for the other
    /// callers.
    pub async fn renew(&self) -> bool {
        let handle = {
            let mut in_flight = self.inner.in_flight.lock();
            if self.inner.tokens.is_renewal_blocked() {
                return false;
            }
            if let Some(handle) = in_flight.as_ref() {
                tracing::debug!("Joining renewal already in flight");
                handle.clone()
            } else {
                let task = tokio::spawn(Arc::clone(&self.inner).run());
                let handle = task.map(|joined| joined.unwrap_or(false)).boxed().shared();
                *in_flight = Some(handle.clone());
                handle
            }
        };
        handle.await
    }

    /// Returns true while a renewal call is in flight.
    #[must_use]
    pub fn is_renewing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }
}

impl Inner {
    async fn run(self: Arc<Self>) -> bool {
        let renewed = self.attempt().await;
        self.in_flight.lock().take();
        renewed
    }

    async fn attempt(&self) -> bool {
        let generation = self.tokens.generation();
        let Some(refresh_token) = self.tokens.long_lived().await else {
            tracing::info!("No long-lived credential to renew with");
            self.tokens.fail_permanently().await;
            return false;
        };

        tracing::debug!("Renewing session credentials");
        let body = match serde_json::to_string(&RenewRequest { refresh_token }) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode renewal request");
                return false;
            }
        };
        let request = OutgoingRequest {
            method: HttpMethod::Post,
            url: self.renew_url.clone(),
            headers: json_headers(None),
            body: Some(body),
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Renewal call failed, keeping session");
                return false;
            }
        };

        match response.status {
            401 | 403 => {
                tracing::info!(status = response.status, "Long-lived credential rejected");
                self.tokens.fail_permanently().await;
                false
            }
            _ if !response.is_success() => {
                tracing::warn!(status = response.status, "Renewal failed, keeping session");
                false
            }
            _ => match serde_json::from_slice::<Envelope<CredentialPair>>(&response.body) {
                Ok(envelope) => {
                    let installed = self.tokens.install_renewed(envelope.result, generation).await;
                    if installed {
                        tracing::info!("Session credentials renewed");
                    }
                    installed
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Renewal response did not decode");
                    false
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::ports::{CredentialStorage, TransportError};
    use crate::test_support::{
        MemoryStorage, ScriptedTransport, counting_observer, json, pair_response,
    };
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tally_domain::SessionState;

    const RENEW_URL: &str = "http://api.test/identity/refresh";

    fn coordinator(
        transport: ScriptedTransport,
        storage: MemoryStorage,
    ) -> (Arc<ScriptedTransport>, Arc<TokenStore>, RefreshCoordinator) {
        let transport = Arc::new(transport);
        let storage: Arc<dyn CredentialStorage> = Arc::new(storage);
        let tokens = Arc::new(TokenStore::new(storage, "refreshToken"));
        let refresher = RefreshCoordinator::new(
            Arc::clone(&tokens),
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            RENEW_URL,
        );
        (transport, tokens, refresher)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_renewal() {
        let (transport, tokens, refresher) = coordinator(
            ScriptedTransport::new(|_| pair_response("A2", "R2"))
                .with_delay(Duration::from_millis(50)),
            MemoryStorage::with("refreshToken", "R1"),
        );

        let results = futures::future::join_all((0..8).map(|_| refresher.renew())).await;

        assert_eq!(results, vec![true; 8]);
        assert_eq!(transport.count("/identity/refresh"), 1);
        assert_eq!(tokens.short_lived(), Some("A2".to_string()));
        assert!(!refresher.is_renewing());
    }

    #[tokio::test]
    async fn test_renewal_sends_long_lived_credential() {
        let (transport, _, refresher) = coordinator(
            ScriptedTransport::new(|_| pair_response("A2", "R2")),
            MemoryStorage::with("refreshToken", "R1"),
        );

        assert!(refresher.renew().await);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].url, RENEW_URL);
        assert_eq!(sent[0].headers.get("Authorization"), None);
        let body: serde_json::Value =
            serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"refreshToken": "R1"}));
    }

    #[tokio::test]
    async fn test_rejected_credential_fails_permanently() {
        let (transport, tokens, refresher) = coordinator(
            ScriptedTransport::new(|_| json(401, &serde_json::json!({"message": "expired"}))),
            MemoryStorage::with("refreshToken", "R1"),
        );
        let (count, observer) = counting_observer();
        tokens.register_failure_observer(observer);

        assert!(!refresher.renew().await);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.state(), SessionState::PermanentlyFailed);
        assert_eq!(tokens.long_lived().await, None);

        // Blocked: no further network traffic.
        assert!(!refresher.renew().await);
        assert_eq!(transport.count("/identity/refresh"), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forbidden_is_also_fatal() {
        let (_, tokens, refresher) = coordinator(
            ScriptedTransport::new(|_| json(403, &serde_json::json!({}))),
            MemoryStorage::with("refreshToken", "R1"),
        );

        assert!(!refresher.renew().await);
        assert!(tokens.is_renewal_blocked());
    }

    #[tokio::test]
    async fn test_missing_long_lived_fails_without_network() {
        let (transport, tokens, refresher) =
            coordinator(ScriptedTransport::new(|_| pair_response("A", "R")), MemoryStorage::default());
        let (count, observer) = counting_observer();
        tokens.register_failure_observer(observer);

        assert!(!refresher.renew().await);
        assert!(transport.sent().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_session() {
        let (_, tokens, refresher) = coordinator(
            ScriptedTransport::new(|_| Err(TransportError::ConnectionFailed("refused".into()))),
            MemoryStorage::with("refreshToken", "R1"),
        );

        assert!(!refresher.renew().await);
        assert!(!tokens.is_renewal_blocked());
        assert_eq!(tokens.long_lived().await, Some("R1".to_string()));
    }

    #[tokio::test]
    async fn test_server_error_and_bad_body_keep_session() {
        let (_, tokens, refresher) = coordinator(
            ScriptedTransport::new(|_| json(500, &serde_json::json!({"message": "boom"}))),
            MemoryStorage::with("refreshToken", "R1"),
        );
        assert!(!refresher.renew().await);
        assert_ne!(tokens.state(), SessionState::PermanentlyFailed);

        let (_, tokens, refresher) = coordinator(
            ScriptedTransport::new(|_| json(200, &serde_json::json!({"result": {}}))),
            MemoryStorage::with("refreshToken", "R1"),
        );
        assert!(!refresher.renew().await);
        assert_eq!(tokens.long_lived().await, Some("R1".to_string()));
    }

    #[tokio::test]
    async fn test_slot_is_released_for_the_next_renewal() {
        let (transport, _, refresher) = coordinator(
            ScriptedTransport::new(|_| pair_response("A2", "R2")),
            MemoryStorage::with("refreshToken", "R1"),
        );

        assert!(refresher.renew().await);
        assert!(refresher.renew().await);
        assert_eq!(transport.count("/identity/refresh"), 2);
    }

    #[tokio::test]
    async fn test_renewal_survives_caller_cancellation() {
        let (transport, tokens, refresher) = coordinator(
            ScriptedTransport::new(|_| pair_response("A2", "R2"))
                .with_delay(Duration::from_millis(30)),
            MemoryStorage::with("refreshToken", "R1"),
        );

        let abandoned = tokio::time::timeout(Duration::from_millis(5), refresher.renew()).await;
        assert!(abandoned.is_err());

        assert!(refresher.renew().await);
        assert_eq!(transport.count("/identity/refresh"), 1);
        assert_eq!(tokens.short_lived(), Some("A2".to_string()));
    }
}
