//! Durable credential storage port
//!
//! Holds the long-lived credential only. The short-lived credential never
//! reaches this port.

use async_trait::async_trait;

/// Errors that can occur during credential storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Durable key-value store for string values.
#[async_trait]
pub trait CredentialStorage: Send + Sync {
    /// Loads the value stored under `key`.
    ///
    /// # Returns
    /// `None` if nothing is stored under the key.
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns an error if the value cannot be written.
    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes the value stored under `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be updated.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
