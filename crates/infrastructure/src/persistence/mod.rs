//! Durable storage adapters.

mod credential_storage;

pub use credential_storage::{FileCredentialStorage, InMemoryCredentialStorage};
