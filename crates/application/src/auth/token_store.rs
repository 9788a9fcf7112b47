//! Session credential storage.
//!
//! The short-lived credential lives in memory only. The long-lived one is
//! mirrored to durable storage so a restarted client can resume the session.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tally_domain::{CredentialPair, SessionState};

use crate::ports::{CredentialStorage, FailureObserver, StorageError};

#[derive(Debug, Default)]
struct Credentials {
    short_lived: Option<String>,
    long_lived: Option<String>,
    phase: SessionState,
    renewal_blocked: bool,
    /// Bumped whenever the session is replaced or torn down.
    generation: u64,
}

/// Thread-safe holder of the session's credential pair.
pub struct TokenStore {
    storage: Arc<dyn CredentialStorage>,
    storage_key: String,
    state: RwLock<Credentials>,
    observer: Mutex<Option<Arc<dyn FailureObserver>>>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("TokenStore")
            .field("storage_key", &self.storage_key)
            .field("phase", &state.phase)
            .field("renewal_blocked", &state.renewal_blocked)
            .field("generation", &state.generation)
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Creates an empty store backed by `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn CredentialStorage>, storage_key: impl Into<String>) -> Self {
        Self {
            storage,
            storage_key: storage_key.into(),
            state: RwLock::new(Credentials::default()),
            observer: Mutex::new(None),
        }
    }

    /// Installs a freshly issued pair and re-enables renewal.
    ///
    /// Memory is updated before the durable write, so a failed write still
    /// leaves a usable session for the lifetime of the process.
    ///
    /// # Errors
    /// Returns the storage error if the long-lived credential could not be
    /// persisted.
    pub async fn set_credentials(&self, pair: CredentialPair) -> Result<(), StorageError> {
        let refresh_token = pair.refresh_token.clone();
        {
            let mut state = self.state.write();
            state.short_lived = Some(pair.access_token);
            state.long_lived = Some(pair.refresh_token);
            state.phase = SessionState::Authenticated;
            state.renewal_blocked = false;
            state.generation += 1;
        }
        self.storage.save(&self.storage_key, &refresh_token).await
    }

    /// Installs a renewed pair unless the session changed since `generation`.
    ///
    /// Returns `false` when a sign-out, clear, or new sign-in happened while
    /// the renewal was in flight; the pair is discarded in that case.
    pub async fn install_renewed(&self, pair: CredentialPair, generation: u64) -> bool {
        let refresh_token = pair.refresh_token.clone();
        {
            let mut state = self.state.write();
            if state.generation != generation || state.renewal_blocked {
                tracing::debug!("Discarding renewed credentials for a superseded session");
                return false;
            }
            state.short_lived = Some(pair.access_token);
            state.long_lived = Some(pair.refresh_token);
            state.phase = SessionState::Authenticated;
        }
        if let Err(e) = self.storage.save(&self.storage_key, &refresh_token).await {
            tracing::warn!(error = %e, "Failed to persist renewed credential");
        }
        true
    }

    /// Forgets both credentials and blocks renewal until the next sign-in.
    ///
    /// Does not notify the failure observer.
    pub async fn clear(&self) {
        {
            let mut state = self.state.write();
            state.short_lived = None;
            state.long_lived = None;
            state.renewal_blocked = true;
            state.generation += 1;
            if state.phase != SessionState::PermanentlyFailed {
                state.phase = SessionState::Anonymous;
            }
        }
        self.remove_durable().await;
    }

    /// Tears the session down after the server rejected the long-lived
    /// credential, then notifies the failure observer.
    ///
    /// The observer fires once per transition: repeated calls while already
    /// failed only clear state.
    pub async fn fail_permanently(&self) {
        let already_failed = {
            let mut state = self.state.write();
            let already_failed = state.phase == SessionState::PermanentlyFailed;
            state.short_lived = None;
            state.long_lived = None;
            state.renewal_blocked = true;
            state.generation += 1;
            state.phase = SessionState::PermanentlyFailed;
            already_failed
        };
        self.remove_durable().await;

        if already_failed {
            return;
        }
        tracing::warn!("Session permanently failed, a new sign-in is required");
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer.on_permanent_failure();
        }
    }

    /// Returns the short-lived credential, if held.
    #[must_use]
    pub fn short_lived(&self) -> Option<String> {
        self.state.read().short_lived.clone()
    }

    /// Returns the long-lived credential, loading it from durable storage on
    /// first use.
    pub async fn long_lived(&self) -> Option<String> {
        let generation = {
            let state = self.state.read();
            if let Some(token) = &state.long_lived {
                return Some(token.clone());
            }
            if state.renewal_blocked {
                return None;
            }
            state.generation
        };

        let loaded = match self.storage.load(&self.storage_key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored credential");
                return None;
            }
        };

        let mut state = self.state.write();
        if state.generation != generation {
            return state.long_lived.clone();
        }
        if state.long_lived.is_none() {
            state.long_lived.clone_from(&loaded);
        }
        state.long_lived.clone()
    }

    /// Removes keys written by older client versions.
    pub async fn purge_legacy(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.storage.remove(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to remove legacy credential");
            }
        }
    }

    /// Registers the callback run on the transition to `PermanentlyFailed`.
    ///
    /// Replaces any previously registered observer.
    pub fn register_failure_observer(&self, observer: impl FailureObserver + 'static) {
        *self.observer.lock() = Some(Arc::new(observer));
    }

    /// Returns the stored lifecycle phase.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.read().phase
    }

    /// Returns true if renewal attempts must not reach the network.
    #[must_use]
    pub fn is_renewal_blocked(&self) -> bool {
        self.state.read().renewal_blocked
    }

    /// Returns the current session generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    async fn remove_durable(&self) {
        if let Err(e) = self.storage.remove(&self.storage_key).await {
            tracing::warn!(error = %e, "Failed to remove stored credential");
        }
    }
}
