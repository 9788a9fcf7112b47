//! Tally Application - Session lifecycle and request gateway
//!
//! Everything here talks to the outside world through the traits in
//! [`ports`]; adapters live in the infrastructure crate.

pub mod auth;
pub mod cache;
pub mod classifier;
pub mod client;
pub mod config;
pub mod gateway;
pub mod ports;

#[cfg(test)]
mod test_support;

pub use auth::{RefreshCoordinator, TokenStore};
pub use cache::ResponseCache;
pub use classifier::{Classification, ErrorClassifier, PARSE_FAILURE_MESSAGE, classify};
pub use client::{ApiClient, ClientPorts};
pub use config::{ClientConfig, Endpoints};
pub use gateway::{GatewayParts, RequestGateway};
