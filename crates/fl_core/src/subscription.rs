//! Unregister handles for watches, event listeners and digest hooks

use std::fmt;

/// Handle returned by every registration on a scope
///
/// Calling [`Subscription::unsubscribe`] releases the registration. Dropping
/// the handle does *not*: a watch outlives its handle until it is
/// explicitly released or the scope is destroyed.
#[must_use = "dropping a Subscription keeps the registration alive"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap an unregister callback
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to release
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Whether the unregister callback has not run yet
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Run the unregister callback; further calls do nothing
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
