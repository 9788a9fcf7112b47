//! In-memory fakes for the ports, shared by the unit tests of this crate.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tally_domain::{ApiResponse, Header, Headers, Notice};

use crate::ports::{
    Clock, CredentialStorage, HttpTransport, Navigator, Notifier, OutgoingRequest, StorageError,
    TransportError,
};

/// Durable storage backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn with(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage
            .values
            .lock()
            .insert(key.to_string(), value.to_string());
        storage
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.values.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl CredentialStorage for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        tokio::task::yield_now().await;
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

type Responder = dyn Fn(&OutgoingRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Transport that answers from a closure and records every request.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    delay: Duration,
    slow_paths: Vec<(String, Duration)>,
    sent: Mutex<Vec<OutgoingRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&OutgoingRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            slow_paths: Vec::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Holds every response back for `delay` so concurrent callers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Holds responses for URLs ending in `url_suffix` back for `delay`.
    pub fn with_slow_path(mut self, url_suffix: &str, delay: Duration) -> Self {
        self.slow_paths.push((url_suffix.to_string(), delay));
        self
    }

    pub fn sent(&self) -> Vec<OutgoingRequest> {
        self.sent.lock().clone()
    }

    pub fn count(&self, url_suffix: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|r| r.url.ends_with(url_suffix))
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse, TransportError> {
        self.sent.lock().push(request.clone());
        let delay = self
            .slow_paths
            .iter()
            .find(|(suffix, _)| request.url.ends_with(suffix.as_str()))
            .map_or(self.delay, |(_, delay)| *delay);
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(&request)
    }
}

/// Returns the value of the Authorization header of `request`, if any.
pub fn authorization(request: &OutgoingRequest) -> Option<String> {
    request.headers.get("Authorization").map(String::from)
}

/// Builds a JSON response.
pub fn json(status: u16, body: &serde_json::Value) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::json(status, body))
}

/// Builds a response with the given headers and no body.
pub fn with_headers(status: u16, headers: &[(&str, &str)]) -> Result<ApiResponse, TransportError> {
    let headers: Headers = headers
        .iter()
        .map(|(name, value)| Header::new(*name, *value))
        .collect();
    Ok(ApiResponse::new(status, headers, Vec::new()))
}

/// A credential pair response as returned by the identity endpoints.
pub fn pair_response(access: &str, refresh: &str) -> Result<ApiResponse, TransportError> {
    json(
        200,
        &serde_json::json!({"result": {"accessToken": access, "refreshToken": refresh}}),
    )
}

/// Clock that only moves when told to.
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Notifier that keeps every notice.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Navigator that counts redirects.
#[derive(Default)]
pub struct CountingNavigator {
    redirects: AtomicUsize,
}

impl CountingNavigator {
    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for CountingNavigator {
    fn to_sign_in(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts failure observer invocations.
pub fn counting_observer() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&count);
    (count, move || {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}
