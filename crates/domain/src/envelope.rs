//! Response envelopes used by the resource API.

use serde::{Deserialize, Serialize};

/// Single-item response: `{"result": T}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The payload
    pub result: T,
}

/// Multi-item response: `{"result": [T, ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    /// The items
    pub result: Vec<T>,
}

/// Paginated response: `{"result": [...], "context": n, "left": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in this page
    pub result: Vec<T>,
    /// Offset to pass as `context` for the next page
    pub context: u64,
    /// Number of items not yet fetched
    pub left: u64,
}

impl<T> Page<T> {
    /// Returns true if more items remain on the server.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.left > 0
    }
}
