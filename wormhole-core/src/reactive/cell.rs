//! Cell Implementation
//!
//! A Cell is the fundamental observable container. It holds exactly one value
//! and notifies listeners about three kinds of events:
//!
//! - `read`: emitted by [`Cell::read`] before the value is returned, carrying
//!   the sub-path for keyed reads
//! - `written`: emitted by every successful [`Cell::write`]
//! - `changed`: emitted by a write only when the new value is not the
//!   [same value](SameValue) as the previous one
//!
//! # Dispatch
//!
//! Notification is synchronous and depth-first: listeners run inside the
//! `write` call, in registration order. A listener may write to other cells
//! (or to this one); the nested propagation completes before the outer
//! dispatch continues. Listeners registered during a dispatch are first called
//! on the next event, listeners removed during a dispatch are never called
//! again.
//!
//! # Re-entrancy
//!
//! Each cell counts how many of its own dispatches are currently on the
//! stack. A write that would push that count past the cell's re-entry limit is
//! rejected with [`Error::ReentrantWrite`] before anything is mutated, which
//! turns a divergent write-back cycle into an error instead of a stack
//! overflow. Cycles that converge (the write-back eventually stores the same
//! value, so `changed` stops firing) are allowed.
//!
//! # Ownership
//!
//! A cell is a cheap handle around shared state; clones observe and mutate the
//! same value. Cells are `!Send` and the core is single-threaded.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::same_value::{lookup, SameValue};
use super::subscription::{Subscription, SubscriptionId};
use super::tracking::{Reads, Source, TrackingFrame};
use crate::error::{Error, Result};

/// Nested dispatches a cell tolerates before rejecting writes.
pub const DEFAULT_REENTRY_LIMIT: usize = 64;

/// Unique identifier for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// The kinds of events a cell emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Read,
    Written,
    Changed,
}

/// Callback for `read` events. Receives the sub-path for keyed reads.
pub type ReadCallback = dyn Fn(Option<&[String]>);

/// Callback for `written` and `changed` events: `(new, previous)`.
pub type WriteCallback<T> = dyn Fn(&T, &T);

/// A listener registration, tagged by the event it wants.
pub enum Listener<T> {
    Read(Rc<ReadCallback>),
    Written(Rc<WriteCallback<T>>),
    Changed(Rc<WriteCallback<T>>),
}

impl<T> Listener<T> {
    pub fn kind(&self) -> EventKind {
        match self {
            Listener::Read(_) => EventKind::Read,
            Listener::Written(_) => EventKind::Written,
            Listener::Changed(_) => EventKind::Changed,
        }
    }
}

struct Entry<T> {
    id: SubscriptionId,
    live: std::cell::Cell<bool>,
    listener: Listener<T>,
}

struct Inner<T> {
    id: CellId,
    value: RefCell<T>,
    listeners: RefCell<Vec<Rc<Entry<T>>>>,
    dispatch_depth: std::cell::Cell<usize>,
    reentry_limit: usize,
}

/// Decrements the dispatch depth when a dispatch ends, including by panic.
struct Dispatching<'a>(&'a std::cell::Cell<usize>);

impl Drop for Dispatching<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// An observable value container.
///
/// # Example
///
/// ```rust
/// use wormhole_core::reactive::Cell;
///
/// let count = Cell::new(0);
/// let seen = std::rc::Rc::new(std::cell::Cell::new(0));
///
/// let seen_clone = seen.clone();
/// let sub = count.on_changed(move |next, _prev| seen_clone.set(*next));
///
/// count.write(5).unwrap();
/// assert_eq!(seen.get(), 5);
///
/// sub.unsubscribe();
/// count.write(6).unwrap();
/// assert_eq!(seen.get(), 5);
/// ```
pub struct Cell<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Cell<T>
where
    T: Clone + SameValue + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_reentry_limit(value, DEFAULT_REENTRY_LIMIT)
    }

    /// Create a new cell with a custom re-entry limit.
    ///
    /// A limit of `1` forbids any write to this cell from inside one of its
    /// own notifications.
    pub fn with_reentry_limit(value: T, reentry_limit: usize) -> Self {
        let id = CellId::next();
        trace!(cell = %id, "cell created");
        Self {
            inner: Rc::new(Inner {
                id,
                value: RefCell::new(value),
                listeners: RefCell::new(Vec::new()),
                dispatch_depth: std::cell::Cell::new(0),
                reentry_limit: reentry_limit.max(1),
            }),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// Emits `read` first and, inside a tracking frame, records this cell as
    /// a dependency of the running computation.
    pub fn read(&self) -> T {
        self.observe(None);
        self.peek()
    }

    /// Get the current value without emitting `read` or being tracked.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Replace the stored value.
    ///
    /// Emits `written` unconditionally and `changed` when the new value is not
    /// the same value as the previous one. Fails only when the re-entry limit
    /// is reached, in which case nothing is mutated.
    pub fn write(&self, value: T) -> Result<()> {
        let inner = &self.inner;
        let depth = inner.dispatch_depth.get();
        if depth >= inner.reentry_limit {
            warn!(cell = %inner.id, depth, "re-entrant write rejected");
            return Err(Error::ReentrantWrite {
                cell: inner.id,
                depth,
            });
        }

        let previous = inner.value.replace(value.clone());
        let changed = !previous.same_value(&value);
        trace!(cell = %inner.id, changed, depth, "write");

        inner.dispatch_depth.set(depth + 1);
        let _dispatching = Dispatching(&inner.dispatch_depth);

        self.emit(EventKind::Written, &value, &previous);
        if changed {
            self.emit(EventKind::Changed, &value, &previous);
        }
        Ok(())
    }

    /// Write the result of `f` applied to the current value.
    ///
    /// The current value is read without emitting `read`.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let current = self.inner.value.borrow();
            f(&current)
        };
        self.write(next)
    }

    /// Register a listener and return its removal handle.
    pub fn subscribe(&self, listener: Listener<T>) -> Subscription {
        let id = SubscriptionId::new();
        let kind = listener.kind();
        let entry = Rc::new(Entry {
            id,
            live: std::cell::Cell::new(true),
            listener,
        });
        self.inner.listeners.borrow_mut().push(Rc::clone(&entry));
        debug!(cell = %self.inner.id, ?kind, subscription = ?id, "subscribed");

        let cell: Weak<Inner<T>> = Rc::downgrade(&self.inner);
        let entry: Weak<Entry<T>> = Rc::downgrade(&entry);
        Subscription::new(id, move || {
            if let Some(entry) = entry.upgrade() {
                entry.live.set(false);
            }
            let Some(cell) = cell.upgrade() else {
                return;
            };
            let removed = {
                let mut listeners = cell.listeners.borrow_mut();
                listeners
                    .iter()
                    .position(|entry| entry.id == id)
                    .map(|index| listeners.remove(index))
            };
            debug!(cell = %cell.id, subscription = ?id, "unsubscribed");
            // The listener closure is dropped here, outside the borrow.
            drop(removed);
        })
    }

    /// Subscribe to `read` events.
    pub fn on_read<F>(&self, f: F) -> Subscription
    where
        F: Fn(Option<&[String]>) + 'static,
    {
        self.subscribe(Listener::Read(Rc::new(f)))
    }

    /// Subscribe to `written` events.
    pub fn on_written<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T, &T) + 'static,
    {
        self.subscribe(Listener::Written(Rc::new(f)))
    }

    /// Subscribe to `changed` events.
    pub fn on_changed<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T, &T) + 'static,
    {
        self.subscribe(Listener::Changed(Rc::new(f)))
    }

    /// Number of live listeners for an event kind.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|entry| entry.listener.kind() == kind)
            .count()
    }

    /// Whether two handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Emit `read` and record the read in the active tracking frame.
    fn observe(&self, path: Option<&[String]>) {
        if TrackingFrame::is_active() {
            TrackingFrame::track(Rc::new(self.clone()), path);
        }

        for entry in self.snapshot(EventKind::Read) {
            if let (true, Listener::Read(f)) = (entry.live.get(), &entry.listener) {
                f(path);
            }
        }
    }

    fn emit(&self, kind: EventKind, value: &T, previous: &T) {
        for entry in self.snapshot(kind) {
            if !entry.live.get() {
                continue;
            }
            match &entry.listener {
                Listener::Written(f) | Listener::Changed(f) => f(value, previous),
                Listener::Read(_) => {}
            }
        }
    }

    fn snapshot(&self, kind: EventKind) -> SmallVec<[Rc<Entry<T>>; 4]> {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|entry| entry.listener.kind() == kind)
            .cloned()
            .collect()
    }
}

impl Cell<Value> {
    /// Read a nested value by key path.
    ///
    /// Emits `read` carrying the path, so a derived cell that only reads this
    /// path ignores changes elsewhere in the value. Returns `None` when the
    /// path does not resolve.
    pub fn read_path<S: AsRef<str>>(&self, path: &[S]) -> Option<Value> {
        let path: Vec<String> = path.iter().map(|s| s.as_ref().to_owned()).collect();
        self.observe(Some(&path));
        lookup(&self.inner.value.borrow(), &path).cloned()
    }

    /// Serialize a host value and write it.
    ///
    /// Values that have no JSON representation are rejected with
    /// [`Error::InvalidValue`] and the cell is left untouched.
    pub fn write_serialized<S: Serialize + ?Sized>(&self, value: &S) -> Result<()> {
        let value = serde_json::to_value(value).map_err(Error::invalid_value)?;
        self.write(value)
    }
}

impl<T> Source for Cell<T>
where
    T: Clone + SameValue + 'static,
{
    fn id(&self) -> CellId {
        self.inner.id
    }

    fn watch(&self, reads: Reads, on_change: Rc<dyn Fn()>) -> Subscription {
        self.on_changed(move |next, previous| {
            let differs = match &reads {
                Reads::Whole => true,
                Reads::Paths(paths) => paths
                    .iter()
                    .any(|path| !next.same_value_at(previous, path)),
            };
            if differs {
                on_change();
            }
        })
    }
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Cell<T>
where
    T: Clone + SameValue + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Cell<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
