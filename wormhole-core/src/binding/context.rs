//! Ambient Context
//!
//! A [`Context`] is the registry of named cells a resolver can reach. It is
//! built explicitly by the host and handed down to every activation that
//! should see it; nothing is looked up globally. A child context inherits its
//! parent's cells and may shadow some of them, which is how a host models a
//! registry inherited down a component tree.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{kind_of, Error, Result};
use crate::reactive::Cell;

/// A named set of cells shared with resolvers.
#[derive(Clone, Default)]
pub struct Context {
    entries: Rc<IndexMap<String, Cell<Value>>>,
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a context from scratch.
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Build a context from a JSON object, wrapping every entry in a new cell.
    ///
    /// Anything other than an object is rejected with
    /// [`Error::InvalidShape`].
    pub fn from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidShape {
                    expected: "object",
                    found: kind_of(&other),
                })
            }
        };
        Ok(map
            .into_iter()
            .fold(Self::builder(), |builder, (name, value)| {
                builder.provide(name, value)
            })
            .build())
    }

    /// Start a child context that inherits every entry of this one.
    pub fn child(&self) -> ContextBuilder {
        ContextBuilder {
            entries: (*self.entries).clone(),
        }
    }

    /// Look up a cell, failing with [`Error::MissingDependency`] when the
    /// name is not provided.
    pub fn get(&self, name: &str) -> Result<Cell<Value>> {
        self.try_get(name).ok_or_else(|| Error::missing(name))
    }

    /// Look up a cell, treating an absent name as `None`.
    pub fn try_get(&self, name: &str) -> Option<Cell<Value>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Provided names, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Cell<Value>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Builder for [`Context`].
#[derive(Default)]
pub struct ContextBuilder {
    entries: IndexMap<String, Cell<Value>>,
}

impl ContextBuilder {
    /// Provide a literal value, wrapped in a new cell.
    pub fn provide(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.provide_cell(name, Cell::new(value.into()))
    }

    /// Provide an existing cell. Shadows an inherited entry of the same name.
    pub fn provide_cell(mut self, name: impl Into<String>, cell: Cell<Value>) -> Self {
        self.entries.insert(name.into(), cell);
        self
    }

    pub fn build(self) -> Context {
        Context {
            entries: Rc::new(self.entries),
        }
    }
}
