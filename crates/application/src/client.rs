//! The API client: one constructible value owning the whole session.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tally_domain::{
    ApiRequest, ClassifiedError, CredentialPair, Envelope, HttpMethod, Notice, RevokeRequest,
    SessionState, SignInRequest,
};

use crate::auth::{RefreshCoordinator, TokenStore};
use crate::cache::ResponseCache;
use crate::classifier::ErrorClassifier;
use crate::config::ClientConfig;
use crate::gateway::{GatewayParts, RequestGateway, json_headers};
use crate::ports::{
    Clock, CredentialStorage, FailureObserver, HttpTransport, Navigator, Notifier, OutgoingRequest,
};

/// External collaborators injected into an [`ApiClient`].
pub struct ClientPorts {
    /// Wire transport
    pub transport: Arc<dyn HttpTransport>,
    /// Durable home of the long-lived credential
    pub storage: Arc<dyn CredentialStorage>,
    /// Time source for cache expiry
    pub clock: Arc<dyn Clock>,
    /// User-facing notices
    pub notifier: Arc<dyn Notifier>,
    /// Sign-in redirect target
    pub navigator: Arc<dyn Navigator>,
}

/// Session-aware client for the resource API.
pub struct ApiClient {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    notifier: Arc<dyn Notifier>,
    tokens: Arc<TokenStore>,
    refresher: RefreshCoordinator,
    classifier: Arc<ErrorClassifier>,
    gateway: RequestGateway,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Wires the session components together.
    #[must_use]
    pub fn new(config: ClientConfig, ports: ClientPorts) -> Self {
        let tokens = Arc::new(TokenStore::new(ports.storage, config.storage_key.clone()));
        let refresher = RefreshCoordinator::new(
            Arc::clone(&tokens),
            Arc::clone(&ports.transport),
            config.url(&config.endpoints.renew),
        );
        let cache = Arc::new(ResponseCache::new(ports.clock, config.cache_ttl()));
        let classifier = Arc::new(ErrorClassifier::new(
            Arc::clone(&ports.notifier),
            config.retry_after_fallback_secs,
        ));
        let gateway = RequestGateway::new(
            config.clone(),
            GatewayParts {
                transport: Arc::clone(&ports.transport),
                tokens: Arc::clone(&tokens),
                refresher: refresher.clone(),
                cache,
                classifier: Arc::clone(&classifier),
                navigator: ports.navigator,
            },
        );

        Self {
            config,
            transport: ports.transport,
            notifier: ports.notifier,
            tokens,
            refresher,
            classifier,
            gateway,
        }
    }

    /// Executes a request through the gateway.
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClassifiedError> {
        self.gateway.execute(request).await
    }

    /// GETs `path` (with query).
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClassifiedError> {
        self.execute(ApiRequest::get(path)).await
    }

    /// POSTs `body` as JSON to `path`.
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClassifiedError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        self.send_json(HttpMethod::Post, path, body).await
    }

    /// PUTs `body` as JSON to `path`.
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ClassifiedError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        self.send_json(HttpMethod::Put, path, body).await
    }

    /// PATCHes `path` with `body` as JSON.
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ClassifiedError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        self.send_json(HttpMethod::Patch, path, body).await
    }

    /// DELETEs `path`.
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClassifiedError> {
        self.execute(ApiRequest::delete(path)).await
    }

    async fn send_json<T, B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> Result<T, ClassifiedError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let request = ApiRequest::new(method, path)
            .with_json(body)
            .map_err(|e| self.classifier.classify_invalid_request(&e))?;
        self.execute(request).await
    }

    /// Exchanges username and password for a session and returns the
    /// signed-in user.
    ///
    /// # Errors
    /// Returns the classified failure. Credentials are cleared on any
    /// failure, without notifying the failure observer.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Value, ClassifiedError> {
        match self.try_sign_in(username, password).await {
            Ok(user) => {
                tracing::info!(username, "Signed in");
                self.notifier.notify(Notice::success("Signed in!"));
                Ok(user)
            }
            Err(e) => {
                tracing::info!(username, kind = ?e.kind(), "Sign-in failed");
                self.tokens.clear().await;
                Err(e)
            }
        }
    }

    async fn try_sign_in(&self, username: &str, password: &str) -> Result<Value, ClassifiedError> {
        let credentials = SignInRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let request = ApiRequest::post(self.config.endpoints.issue.clone())
            .with_json(&credentials)
            .map_err(|e| self.classifier.classify_invalid_request(&e))?
            .without_credential();

        let issued: Envelope<CredentialPair> = self.gateway.execute(request).await?;
        if let Err(e) = self.tokens.set_credentials(issued.result).await {
            tracing::warn!(error = %e, "Could not persist session, it will not survive a restart");
        }
        self.gateway.rearm();
        self.gateway.invalidate_cache();

        self.current_user().await
    }

    /// Ends the session.
    ///
    /// The server is asked to revoke the long-lived credential on a
    /// best-effort basis; local state is cleared either way. Safe to call
    /// repeatedly.
    pub async fn sign_out(&self) {
        if let Some(refresh_token) = self.tokens.long_lived().await {
            self.revoke(refresh_token).await;
        }
        self.tokens.clear().await;
        self.gateway.invalidate_cache();
        tracing::info!("Signed out");
    }

    async fn revoke(&self, refresh_token: String) {
        let body = match serde_json::to_string(&RevokeRequest { refresh_token }) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping revoke, body did not encode");
                return;
            }
        };
        let request = OutgoingRequest {
            method: HttpMethod::Post,
            url: self.config.url(&self.config.endpoints.revoke),
            headers: json_headers(self.tokens.short_lived().as_deref()),
            body: Some(body),
        };
        match self.transport.send(request).await {
            Ok(response) if response.is_success() => {
                tracing::debug!("Long-lived credential revoked");
            }
            Ok(response) => tracing::debug!(status = response.status, "Revoke rejected"),
            Err(e) => tracing::debug!(error = %e, "Revoke failed"),
        }
    }

    /// Resumes a persisted session at start-up.
    ///
    /// A held short-lived credential is tried first; if fetching the user
    /// with it fails, the session is renewed and the fetch repeated.
    ///
    /// Returns the signed-in user, or `None` when there is no session to
    /// resume or it could not be renewed.
    pub async fn restore(&self) -> Option<Value> {
        self.tokens
            .purge_legacy(&self.config.legacy_storage_keys)
            .await;

        if self.tokens.long_lived().await.is_none() {
            tracing::debug!("No stored session");
            return None;
        }
        if self.tokens.short_lived().is_some() {
            match self.current_user().await {
                Ok(user) => return Some(user),
                Err(e) => tracing::debug!(kind = ?e.kind(), "Held credential failed, renewing"),
            }
        }
        if !self.refresher.renew().await {
            tracing::info!(state = %self.state(), "Stored session could not be resumed");
            return None;
        }
        self.current_user().await.ok()
    }

    /// Fetches the signed-in user.
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn current_user(&self) -> Result<Value, ClassifiedError> {
        let user: Envelope<Value> = self
            .gateway
            .execute(ApiRequest::get(self.config.endpoints.current_user.clone()))
            .await?;
        Ok(user.result)
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.refresher.is_renewing() {
            SessionState::Refreshing
        } else {
            self.tokens.state()
        }
    }

    /// Registers the callback run when the session permanently fails.
    pub fn register_failure_observer(&self, observer: impl FailureObserver + 'static) {
        self.tokens.register_failure_observer(observer);
    }

    /// Returns the configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}
