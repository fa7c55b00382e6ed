//! Reactive Primitives
//!
//! This module implements the observable core: cells, derived cells and the
//! tracking frame that connects them.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A [`Cell`] is a container for mutable state. Reading it emits a `read`
//! event, writing it emits `written` and, when the value really changed,
//! `changed`. Listeners are attached with `subscribe` and removed with the
//! returned [`Subscription`].
//!
//! ## Derived Cells
//!
//! A [`Derived`] cell holds the result of a function over other cells. Its
//! sources are discovered, not declared: the function runs once inside a
//! [`TrackingFrame`] that records every cell read, and the derived cell then
//! listens to exactly those cells.
//!
//! # Implementation Notes
//!
//! Everything here is single-threaded and synchronous. Cells are `Rc`-based
//! handles, tracking frames live on a thread-local stack, and a write runs all
//! listeners (and whatever they write in turn) before it returns.

mod cell;
mod derived;
mod same_value;
mod subscription;
mod tracking;

pub use cell::{
    Cell, CellId, EventKind, Listener, ReadCallback, WriteCallback, DEFAULT_REENTRY_LIMIT,
};
pub use derived::Derived;
pub use same_value::{lookup, Path, SameValue};
pub use subscription::{Subscription, SubscriptionId, SubscriptionSet};
pub use tracking::{untracked, Reads, TrackingFrame};
