// ── Death watches ──
//
// Linking to a remote object's death returns a `Subscription`. The death
// recipient fires at most once; cancelling (or dropping) the subscription
// unlinks it.

use std::fmt;
use std::sync::Arc;

/// Callback invoked when a watched remote object dies.
pub type DeathRecipient = Arc<dyn Fn() + Send + Sync>;

/// Handle to a registration on a remote object.
///
/// Dropping the handle cancels the registration.
pub struct Subscription {
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    /// A registration that needs no teardown.
    pub fn noop() -> Self {
        Self { on_cancel: None }
    }

    /// Cancel the registration now.
    pub fn cancel(mut self) {
        if let Some(f) = self.on_cancel.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.on_cancel.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.on_cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn cancel_runs_teardown_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sub.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_runs_teardown() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        {
            let _sub = Subscription::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
