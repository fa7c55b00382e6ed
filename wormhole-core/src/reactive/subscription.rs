//! Subscription handles.
//!
//! Every `subscribe` call returns a [`Subscription`]. Invoking
//! [`Subscription::unsubscribe`] removes exactly that registration; calling it
//! again is a no-op. Dropping a handle does *not* detach the listener: the
//! owner (a derived cell or a binding adapter) decides when teardown happens.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// The removal handle returned by every subscribe call.
#[must_use = "a subscription stays attached until `unsubscribe` is called"]
pub struct Subscription {
    id: SubscriptionId,
    detach: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    pub(crate) fn new<F>(id: SubscriptionId, detach: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            id,
            detach: RefCell::new(Some(Box::new(detach))),
        }
    }

    /// Get the subscription's unique ID.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether the registration is still attached.
    pub fn is_active(&self) -> bool {
        self.detach.borrow().is_some()
    }

    /// Remove the registration.
    ///
    /// Idempotent: the second and later calls do nothing.
    pub fn unsubscribe(&self) {
        let detach = self.detach.borrow_mut().take();
        if let Some(detach) = detach {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// A group of subscriptions torn down together.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    handles: SmallVec<[Subscription; 4]>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.handles.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Invoke every removal handle once and forget them.
    pub fn unsubscribe_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.unsubscribe();
        }
    }
}
