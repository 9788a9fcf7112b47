//! Notifier and navigator adapters that report through `tracing`.

use tally_application::ports::{Navigator, Notifier};
use tally_domain::{Notice, NoticeLevel};

/// Writes notices to the log: errors at `error`, successes at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::error!(target: "tally::notice", "{}", notice.message),
            NoticeLevel::Success => tracing::info!(target: "tally::notice", "{}", notice.message),
        }
    }
}

/// Navigator for headless use: logs a hint telling the user how to sign in.
#[derive(Debug, Clone)]
pub struct HintNavigator {
    hint: String,
}

impl HintNavigator {
    /// Creates a navigator that logs `hint` on every redirect.
    #[must_use]
    pub fn new(hint: impl Into<String>) -> Self {
        Self { hint: hint.into() }
    }
}

impl Navigator for HintNavigator {
    fn to_sign_in(&self) {
        tracing::warn!(target: "tally::notice", "{}", self.hint);
    }
}
