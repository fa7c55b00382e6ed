//! Wormhole Core
//!
//! This crate provides the reactive core of the Wormhole store: observable
//! cells and the adapter that binds them to UI component props.
//! It implements:
//!
//! - Observable cells with `read`/`written`/`changed` events
//! - Derived cells with automatic dependency tracking
//! - A binding adapter that feeds component render state from cells
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: cells, subscriptions, dependency tracking and derived cells
//! - `binding`: ambient contexts, connectors and component activations
//! - `error`: the error taxonomy shared by both
//!
//! The core is single-threaded and synchronous. A write dispatches all
//! listeners before it returns, and nested writes propagate depth-first.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use serde_json::json;
//! use wormhole_core::binding::{Bindings, Connector, Context, Props};
//!
//! let context = Context::builder().provide("count", 1).build();
//!
//! let connector = Connector::new(|ctx| {
//!     let count = ctx.get("count")?;
//!     let source = count.clone();
//!     Ok(Bindings::new()
//!         .cell("count", count)
//!         .derived("doubled", move || json!(source.read().as_i64().unwrap_or(0) * 2)))
//! });
//!
//! let updates = Rc::new(RefCell::new(Vec::new()));
//! let sink = updates.clone();
//! let activation = connector
//!     .activate(&context, move |partial: Props| sink.borrow_mut().push(partial))
//!     .unwrap();
//!
//! assert_eq!(activation.get("doubled"), Some(json!(2)));
//!
//! context.get("count").unwrap().write(json!(5)).unwrap();
//! assert_eq!(activation.get("doubled"), Some(json!(10)));
//! assert_eq!(updates.borrow().len(), 2);
//!
//! activation.deactivate();
//! ```

pub mod binding;
pub mod error;
pub mod reactive;

pub use error::{Error, Result};
