//! Derived Cell Implementation
//!
//! A Derived cell holds the result of a pure function over other cells. The
//! caller never lists the sources: they are discovered by running the function
//! once inside a [`TrackingFrame`].
//!
//! # How Derived Cells Work
//!
//! 1. On creation the function runs immediately, inside a fresh tracking frame.
//!    Every cell read during that run is recorded, together with the sub-paths
//!    read from keyed cells.
//!
//! 2. The frame is popped. Tracking is a snapshot: the dependency set is fixed
//!    from here on.
//!
//! 3. Each discovered source gets one persistent `changed` listener. When it
//!    fires and the value differs at a recorded read, the function runs again
//!    (untracked) and its result is written into the derived cell's own value,
//!    which in turn notifies the derived cell's subscribers.
//!
//! A function that reads no cell computes once and never updates.
//!
//! # Lifetime
//!
//! [`Derived::dispose`] detaches every source listener. Source listeners only
//! hold weak references, so dropping the last handle detaches them as well.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, warn};

use super::cell::{Cell, CellId, Listener};
use super::same_value::SameValue;
use super::subscription::{Subscription, SubscriptionSet};
use super::tracking::{untracked, TrackingFrame};

struct Inner<T> {
    value: Cell<T>,
    compute: Box<dyn Fn() -> T>,
    sources: RefCell<SubscriptionSet>,
    dependency_count: usize,
    recomputes: std::cell::Cell<usize>,
    disposed: std::cell::Cell<bool>,
}

impl<T> Inner<T>
where
    T: Clone + SameValue + 'static,
{
    fn recompute(&self) {
        if self.disposed.get() {
            return;
        }

        let next = untracked(|| (self.compute)());
        self.recomputes.set(self.recomputes.get() + 1);

        if let Err(err) = self.value.write(next) {
            warn!(cell = %self.value.id(), %err, "derived recompute dropped");
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.sources.borrow_mut().unsubscribe_all();
        debug!(cell = %self.value.id(), "derived cell disposed");
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        self.sources.get_mut().unsubscribe_all();
    }
}

/// A read-only cell computed from other cells.
///
/// # Example
///
/// ```rust
/// use wormhole_core::reactive::{Cell, Derived};
///
/// let count = Cell::new(2);
/// let source = count.clone();
/// let doubled = Derived::new(move || source.read() * 2);
///
/// assert_eq!(doubled.read(), 4);
/// count.write(5).unwrap();
/// assert_eq!(doubled.read(), 10);
/// ```
pub struct Derived<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Derived<T>
where
    T: Clone + SameValue + 'static,
{
    /// Create a derived cell, computing its initial value immediately.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let (initial, dependencies) = {
            let frame = TrackingFrame::enter();
            let value = compute();
            (value, frame.take_dependencies())
        };

        let inner = Rc::new(Inner {
            value: Cell::new(initial),
            compute: Box::new(compute),
            sources: RefCell::new(SubscriptionSet::new()),
            dependency_count: dependencies.len(),
            recomputes: std::cell::Cell::new(0),
            disposed: std::cell::Cell::new(false),
        });

        let weak: Weak<Inner<T>> = Rc::downgrade(&inner);
        let on_change: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.recompute();
            }
        });

        {
            let mut sources = inner.sources.borrow_mut();
            for dependency in dependencies {
                sources.push(
                    dependency
                        .source
                        .watch(dependency.reads, Rc::clone(&on_change)),
                );
            }
        }

        debug!(
            cell = %inner.value.id(),
            dependencies = inner.dependency_count,
            "derived cell created"
        );

        Self { inner }
    }

    /// Get the ID of the cell holding the derived value.
    pub fn id(&self) -> CellId {
        self.inner.value.id()
    }

    /// Get the current value.
    ///
    /// Inside a tracking frame this records the derived cell as a dependency,
    /// so derived cells can be chained.
    pub fn read(&self) -> T {
        self.inner.value.read()
    }

    /// Get the current value without emitting `read`.
    pub fn peek(&self) -> T {
        self.inner.value.peek()
    }

    /// Subscribe to the derived cell's events.
    pub fn subscribe(&self, listener: Listener<T>) -> Subscription {
        self.inner.value.subscribe(listener)
    }

    /// Subscribe to `changed` events of the derived value.
    pub fn on_changed<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T, &T) + 'static,
    {
        self.inner.value.on_changed(f)
    }

    /// Number of source cells discovered on the initial run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependency_count
    }

    /// How many times the function ran after the initial computation.
    pub fn recompute_count(&self) -> usize {
        self.inner.recomputes.get()
    }

    /// Detach from all sources. Idempotent.
    ///
    /// The last computed value stays readable.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl Derived<Value> {
    /// Read a nested value by key path, tracked at that path.
    pub fn read_path<S: AsRef<str>>(&self, path: &[S]) -> Option<Value> {
        self.inner.value.read_path(path)
    }
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Derived<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("value", &self.inner.value)
            .field("dependency_count", &self.inner.dependency_count)
            .field("recomputes", &self.inner.recomputes.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
