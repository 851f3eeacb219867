//! Operation contexts: cancellation and deadlines.
//!
//! Every backend operation takes a [`Context`]. The context is checked
//! before any state is touched, so a canceled or expired context can
//! never leave partial effects behind.

use crate::error::{BackendError, BackendResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation and deadline scope for one or more operations.
///
/// Contexts are cheap to clone and safe to share across threads. The
/// default context never cancels and never expires.
#[derive(Debug, Clone, Default)]
pub struct Context {
    canceled: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that never cancels and never expires.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context with a cancellation handle.
    ///
    /// Tripping the handle aborts every subsequent operation using this
    /// context (or a clone of it) with [`BackendError::Canceled`].
    #[must_use]
    pub fn with_cancel() -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = Self {
            canceled: Some(Arc::clone(&flag)),
            deadline: None,
        };
        (ctx, CancelHandle(flag))
    }

    /// A context that expires after the given duration.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            canceled: None,
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Checks whether this context has been canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Fails fast if the context is canceled or past its deadline.
    ///
    /// Adapters call this on entry to every operation, before acquiring
    /// locks or touching state.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Canceled`] or
    /// [`BackendError::DeadlineExceeded`].
    pub fn check(&self) -> BackendResult<()> {
        if self.is_canceled() {
            return Err(BackendError::Canceled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(BackendError::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

/// Trips the cancellation flag of the [`Context`] it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Cancels the associated context. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_never_fails() {
        let ctx = Context::background();
        assert!(ctx.check().is_ok());
        assert!(!ctx.is_canceled());
    }

    #[test]
    fn cancel_aborts_check() {
        let (ctx, handle) = Context::with_cancel();
        assert!(ctx.check().is_ok());

        handle.cancel();
        assert!(ctx.is_canceled());
        assert!(matches!(ctx.check(), Err(BackendError::Canceled)));
    }

    #[test]
    fn cancel_reaches_clones() {
        let (ctx, handle) = Context::with_cancel();
        let clone = ctx.clone();
        handle.cancel();
        assert!(matches!(clone.check(), Err(BackendError::Canceled)));
    }

    #[test]
    fn expired_deadline_aborts_check() {
        let ctx = Context::with_timeout(Duration::ZERO);
        assert!(matches!(ctx.check(), Err(BackendError::DeadlineExceeded)));
    }

    #[test]
    fn generous_deadline_passes() {
        let ctx = Context::with_timeout(Duration::from_secs(3600));
        assert!(ctx.check().is_ok());
    }
}
