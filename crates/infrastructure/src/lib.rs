//! Tally Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer.

pub mod adapters;
pub mod persistence;
pub mod serialization;
pub mod settings;

pub use adapters::{HintNavigator, ReqwestTransport, SystemClock, TracingNotifier};
pub use persistence::{FileCredentialStorage, InMemoryCredentialStorage};
pub use serialization::{SerializationError, from_json_bytes, to_json_stable, to_json_stable_bytes};
pub use settings::{Settings, SettingsError};
