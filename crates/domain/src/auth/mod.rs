//! Authentication domain types

mod types;

pub use types::{
    CredentialPair, RenewRequest, RevokeRequest, SessionState, SignInRequest, bearer,
};
