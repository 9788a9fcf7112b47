//! End-to-end session tests: the application core wired to the real
//! credential storage adapters and a scripted identity server.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::tempdir;

use tally_application::ports::{
    CredentialStorage, HttpTransport, Navigator, Notifier, OutgoingRequest, TransportError,
};
use tally_application::{ApiClient, ClientConfig, ClientPorts};
use tally_domain::{ApiRequest, ApiResponse, ErrorKind, Notice, SessionState};
use tally_infrastructure::{FileCredentialStorage, InMemoryCredentialStorage, SystemClock};

/// Identity server that issues numbered credential pairs and accepts only
/// the most recent short-lived credential.
#[derive(Default)]
struct FakeServer {
    issued: AtomicUsize,
    current: Mutex<Option<String>>,
    reject_renewal: AtomicBool,
    log: Mutex<Vec<String>>,
}

impl FakeServer {
    fn issue(&self) -> ApiResponse {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        *self.current.lock() = Some(format!("A{n}"));
        ApiResponse::json(
            200,
            &json!({"result": {"accessToken": format!("A{n}"), "refreshToken": format!("R{n}")}}),
        )
    }

    fn expire(&self) {
        *self.current.lock() = None;
    }

    fn calls(&self, suffix: &str) -> usize {
        self.log.lock().iter().filter(|u| u.ends_with(suffix)).count()
    }
}

#[async_trait]
impl HttpTransport for FakeServer {
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse, TransportError> {
        self.log.lock().push(request.url.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let path = request.url.trim_start_matches("http://api.test");
        let response = match path {
            "/identity/tokens" => {
                let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
                if body["password"] == "secret" {
                    self.issue()
                } else {
                    ApiResponse::json(401, &json!({"message": "Invalid credentials"}))
                }
            }
            "/identity/refresh" => {
                if self.reject_renewal.load(Ordering::SeqCst) {
                    ApiResponse::json(401, &json!({"message": "Refresh token revoked"}))
                } else {
                    self.issue()
                }
            }
            "/identity/revoke-refresh" => ApiResponse::json(200, &json!({})),
            _ => {
                let expected = self.current.lock().clone().map(|t| format!("Bearer {t}"));
                let presented = request.headers.get("Authorization").map(String::from);
                if expected.is_some() && presented == expected {
                    ApiResponse::json(200, &json!({"result": {"path": path}}))
                } else {
                    ApiResponse::json(401, &json!({"message": "Token expired"}))
                }
            }
        };
        Ok(response)
    }
}

#[derive(Default)]
struct Recorder {
    notices: Mutex<Vec<Notice>>,
    redirects: AtomicUsize,
}

impl Notifier for Recorder {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

impl Navigator for Recorder {
    fn to_sign_in(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

fn client(
    server: &Arc<FakeServer>,
    storage: Arc<dyn CredentialStorage>,
    recorder: &Arc<Recorder>,
) -> ApiClient {
    ApiClient::new(
        ClientConfig::new("http://api.test"),
        ClientPorts {
            transport: Arc::clone(server) as Arc<dyn HttpTransport>,
            storage,
            clock: Arc::new(SystemClock::new()),
            notifier: Arc::clone(recorder) as Arc<dyn Notifier>,
            navigator: Arc::clone(recorder) as Arc<dyn Navigator>,
        },
    )
}

#[tokio::test]
async fn test_session_survives_restart_through_credential_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    let server = Arc::new(FakeServer::default());
    let recorder = Arc::new(Recorder::default());

    let first = client(&server, Arc::new(FileCredentialStorage::new(&path)), &recorder);
    first.sign_in("ada", "secret").await.unwrap();
    drop(first);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"refreshToken\": \"R1\""));
    assert!(!content.contains("A1"));

    let second = client(&server, Arc::new(FileCredentialStorage::new(&path)), &recorder);
    let user = second.restore().await;

    assert_eq!(user, Some(json!({"path": "/identity/users"})));
    assert_eq!(second.state(), SessionState::Authenticated);
    assert_eq!(server.calls("/identity/refresh"), 1);
}

#[tokio::test]
async fn test_expired_credential_is_renewed_once_for_concurrent_requests() {
    let server = Arc::new(FakeServer::default());
    let recorder = Arc::new(Recorder::default());
    let client = client(&server, Arc::new(InMemoryCredentialStorage::new()), &recorder);
    client.sign_in("ada", "secret").await.unwrap();

    server.expire();
    let paths = ["/a", "/b", "/c", "/d"];
    let results = join_all(
        paths
            .iter()
            .map(|path| client.execute::<Value>(ApiRequest::post(*path))),
    )
    .await;

    for (path, result) in paths.iter().zip(results) {
        assert_eq!(result.unwrap(), json!({"result": {"path": path}}));
    }
    assert_eq!(server.calls("/identity/refresh"), 1);
    assert_eq!(recorder.redirects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_revoked_session_redirects_once_and_blocks_renewal() {
    let server = Arc::new(FakeServer::default());
    let recorder = Arc::new(Recorder::default());
    let storage = Arc::new(InMemoryCredentialStorage::new());
    let client = client(&server, Arc::clone(&storage) as Arc<dyn CredentialStorage>, &recorder);
    let failures = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&failures);
    client.register_failure_observer(move || {
        observed.fetch_add(1, Ordering::SeqCst);
    });
    client.sign_in("ada", "secret").await.unwrap();

    server.expire();
    server.reject_renewal.store(true, Ordering::SeqCst);
    let first = client.execute::<Value>(ApiRequest::get("/accounts")).await;
    let second = client.execute::<Value>(ApiRequest::get("/accounts")).await;

    assert_eq!(first.unwrap_err().kind(), ErrorKind::Authentication);
    assert_eq!(second.unwrap_err().kind(), ErrorKind::Authentication);
    assert_eq!(server.calls("/identity/refresh"), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.redirects.load(Ordering::SeqCst), 1);
    assert_eq!(client.state(), SessionState::PermanentlyFailed);
    assert_eq!(storage.load("refreshToken").await.unwrap(), None);

    // A fresh sign-in recovers the session and re-arms the redirect.
    server.reject_renewal.store(false, Ordering::SeqCst);
    client.sign_in("ada", "secret").await.unwrap();
    let value: Value = client.execute(ApiRequest::get("/accounts")).await.unwrap();
    assert_eq!(value, json!({"result": {"path": "/accounts"}}));
    assert_eq!(client.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_wrong_password_is_reported_without_redirect() {
    let server = Arc::new(FakeServer::default());
    let recorder = Arc::new(Recorder::default());
    let client = client(&server, Arc::new(InMemoryCredentialStorage::new()), &recorder);

    let error = client.sign_in("ada", "hunter2").await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Authentication);
    assert_eq!(server.calls("/identity/refresh"), 0);
    assert_eq!(recorder.redirects.load(Ordering::SeqCst), 0);
    let messages: Vec<String> = recorder
        .notices
        .lock()
        .iter()
        .map(|n| n.message.clone())
        .collect();
    assert_eq!(messages, vec!["Invalid credentials".to_string()]);
}

#[tokio::test]
async fn test_sign_out_twice_revokes_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    let server = Arc::new(FakeServer::default());
    let recorder = Arc::new(Recorder::default());
    let client = client(&server, Arc::new(FileCredentialStorage::new(&path)), &recorder);
    client.sign_in("ada", "secret").await.unwrap();

    client.sign_out().await;
    client.sign_out().await;

    assert_eq!(server.calls("/identity/revoke-refresh"), 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}\n");
    assert_eq!(client.state(), SessionState::Anonymous);
}
