//! Clock port for time-related operations

use std::time::Instant;

/// Port for getting the current monotonic time.
///
/// This abstraction allows testing time-dependent code (cache expiry)
/// by providing a mock implementation.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}
