//! Session credentials for the Tally API client.
//!
//! This module provides:
//! - The credential store with its durable long-lived half
//! - Single-flight renewal of the credential pair

mod refresh;
mod token_store;

pub use refresh::RefreshCoordinator;
pub use token_store::TokenStore;
