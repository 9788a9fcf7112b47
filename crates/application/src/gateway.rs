//! Single entry point for authenticated resource calls.
//!
//! A logical request runs: cache check, dispatch, classification, one
//! renew-and-retry on 401, final return.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tally_domain::{ApiRequest, ApiResponse, ClassifiedError, Header, Headers, bearer};
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::{RefreshCoordinator, TokenStore};
use crate::cache::ResponseCache;
use crate::classifier::{ErrorClassifier, session_expired};
use crate::config::ClientConfig;
use crate::ports::{HttpTransport, Navigator, OutgoingRequest};

/// Builds the JSON headers every call carries, plus the bearer credential
/// when one is given.
pub(crate) fn json_headers(credential: Option<&str>) -> Headers {
    let mut headers = Headers::new();
    headers.add(Header::new("Content-Type", "application/json"));
    if let Some(token) = credential {
        headers.add(Header::new("Authorization", bearer(token)));
    }
    headers
}

/// Collaborators of a [`RequestGateway`].
pub struct GatewayParts {
    /// Wire transport
    pub transport: Arc<dyn HttpTransport>,
    /// Session credentials
    pub tokens: Arc<TokenStore>,
    /// Single-flight renewal
    pub refresher: RefreshCoordinator,
    /// Idempotent response cache
    pub cache: Arc<ResponseCache>,
    /// Failure classification and notices
    pub classifier: Arc<ErrorClassifier>,
    /// Sign-in redirect target
    pub navigator: Arc<dyn Navigator>,
}

/// Executes resource requests with credential attachment, caching, and
/// transparent recovery from an expired short-lived credential.
pub struct RequestGateway {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenStore>,
    refresher: RefreshCoordinator,
    cache: Arc<ResponseCache>,
    classifier: Arc<ErrorClassifier>,
    navigator: Arc<dyn Navigator>,
    /// Set once the user has been sent to sign in; cleared by `rearm`.
    redirecting: AtomicBool,
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("base_url", &self.config.base_url)
            .field("redirecting", &self.redirecting.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl RequestGateway {
    /// Creates a gateway for `config.base_url`.
    #[must_use]
    pub fn new(config: ClientConfig, parts: GatewayParts) -> Self {
        Self {
            config,
            transport: parts.transport,
            tokens: parts.tokens,
            refresher: parts.refresher,
            cache: parts.cache,
            classifier: parts.classifier,
            navigator: parts.navigator,
            redirecting: AtomicBool::new(false),
        }
    }

    /// Executes `request` and decodes the payload into `T`.
    ///
    /// Empty payloads decode from JSON `null`, so `()` and `Option<_>`
    /// targets accept 204 responses.
    ///
    /// # Errors
    /// Returns the classified failure; it has already been surfaced to the
    /// notifier.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClassifiedError> {
        let value = self.execute_raw(request).await?;
        serde_json::from_value(value).map_err(|e| self.classifier.classify_decode(&e))
    }

    /// Executes `request` and returns the payload as JSON.
    ///
    /// # Errors
    /// Returns the classified failure; it has already been surfaced to the
    /// notifier.
    pub async fn execute_raw(&self, request: ApiRequest) -> Result<Value, ClassifiedError> {
        if let Err(e) = request.validate() {
            return Err(self.classifier.classify_invalid_request(&e));
        }
        let span = tracing::debug_span!(
            "request",
            id = %Uuid::now_v7(),
            method = %request.method,
            path = %request.path,
        );
        self.run(request).instrument(span).await
    }

    /// Drops every cached response.
    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    /// Allows the next unrecoverable 401 to redirect to sign-in again.
    pub fn rearm(&self) {
        self.redirecting.store(false, Ordering::SeqCst);
    }

    async fn run(&self, request: ApiRequest) -> Result<Value, ClassifiedError> {
        let cache_key = request.is_cacheable().then(|| request.cache_key());
        if let Some(value) = cache_key.as_deref().and_then(|key| self.cache.get(key)) {
            tracing::debug!("Serving response from cache");
            return Ok(value);
        }
        let epoch = self.cache.epoch();

        let body = request.body.as_ref().map(Value::to_string);
        let mut response = self.dispatch(&request, body.clone()).await?;

        if response.status == 401 && !request.skip_credential {
            tracing::debug!("Short-lived credential rejected, renewing");
            if !self.refresher.renew().await {
                return Err(self.force_reauthentication().await);
            }
            response = self.dispatch(&request, body).await?;
            if response.status == 401 {
                return Err(self.force_reauthentication().await);
            }
        }

        self.complete(&response, cache_key, epoch)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        body: Option<String>,
    ) -> Result<ApiResponse, ClassifiedError> {
        let credential = if request.skip_credential {
            None
        } else {
            self.tokens.short_lived()
        };
        let outgoing = OutgoingRequest {
            method: request.method,
            url: self.config.url(&request.path),
            headers: json_headers(credential.as_deref()),
            body,
        };
        self.transport
            .send(outgoing)
            .await
            .map_err(|e| self.classifier.classify_transport(&e))
    }

    fn complete(
        &self,
        response: &ApiResponse,
        cache_key: Option<String>,
        epoch: u64,
    ) -> Result<Value, ClassifiedError> {
        if !response.is_success() {
            return Err(self.classifier.classify_response(response));
        }

        let value = if response.is_empty() {
            Value::Null
        } else {
            response
                .json_body()
                .map_err(|e| self.classifier.classify_decode(&e))?
        };
        if let Some(key) = cache_key
            && !self.cache.set_if_epoch(key, value.clone(), epoch)
        {
            tracing::debug!("Cache was cleared while in flight, response not cached");
        }
        Ok(value)
    }

    /// Tears the session down and redirects to sign-in, at most once until
    /// `rearm` is called.
    async fn force_reauthentication(&self) -> ClassifiedError {
        if self.redirecting.swap(true, Ordering::SeqCst) {
            return session_expired();
        }
        tracing::warn!("Session could not be recovered, redirecting to sign-in");
        self.cache.clear();
        self.tokens.clear().await;
        self.navigator.to_sign_in();
        self.classifier.session_expired()
    }
}
