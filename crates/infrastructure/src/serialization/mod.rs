//! Deterministic JSON serialization for files on disk.
//!
//! Keeps stored files stable across writes:
//! - Sorting object keys alphabetically (via `BTreeMap`)
//! - Using 2-space indentation
//! - Adding trailing newline

mod json;

pub use json::*;
