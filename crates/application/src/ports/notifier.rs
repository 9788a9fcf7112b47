//! User notification and navigation ports

use tally_domain::Notice;

/// Renders notices to the user (toasts, stderr, a log...).
pub trait Notifier: Send + Sync {
    /// Shows a single notice.
    fn notify(&self, notice: Notice);
}

/// Moves the embedding application to its sign-in entry point.
pub trait Navigator: Send + Sync {
    /// Called when the session cannot be recovered without a new sign-in.
    fn to_sign_in(&self);
}

/// Observer of the transition into `SessionState::PermanentlyFailed`.
pub trait FailureObserver: Send + Sync {
    /// Called once per transition.
    fn on_permanent_failure(&self);
}

impl<F> FailureObserver for F
where
    F: Fn() + Send + Sync,
{
    fn on_permanent_failure(&self) {
        self();
    }
}
