//! Credential storage implementations.
//!
//! `FileCredentialStorage` keeps a small JSON object on disk:
//! ```json
//! {
//!   "refreshToken": "..."
//! }
//! ```
//! Writes go to a sibling temp file that is then renamed over the original.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tally_application::ports::{CredentialStorage, StorageError};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

use crate::serialization::{from_json_bytes, to_json_stable_bytes};

/// Durable credential storage in a single JSON file.
#[derive(Debug)]
pub struct FileCredentialStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileCredentialStorage {
    /// Creates a storage backed by `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        from_json_bytes(&content).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content =
            to_json_stable_bytes(values).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        fs::write(&temp, &content).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStorage for FileCredentialStorage {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.write_all(&values).await
    }
}

/// Process-local credential storage; nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStorage {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryCredentialStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStorage for InMemoryCredentialStorage {
    async fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
