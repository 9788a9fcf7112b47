//! Tally Domain - Core business types
//!
//! This crate defines the domain model for the Tally API client.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod envelope;
pub mod error;
pub mod failure;
pub mod notice;
pub mod request;
pub mod response;

pub use auth::{CredentialPair, RenewRequest, RevokeRequest, SessionState, SignInRequest, bearer};
pub use envelope::{Envelope, ListEnvelope, Page};
pub use error::{DomainError, DomainResult};
pub use failure::{
    ClassifiedError, DEFAULT_RETRY_AFTER_SECS, ErrorBody, ErrorDetail, ErrorKind, ErrorResult,
};
pub use notice::{Notice, NoticeLevel};
pub use request::{ApiRequest, Header, Headers, HttpMethod};
pub use response::ApiResponse;
