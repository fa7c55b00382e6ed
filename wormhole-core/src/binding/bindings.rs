//! Bindings
//!
//! A resolver answers "what does this component bind to" with a [`Bindings`]
//! map. Each entry is a [`Binding`]: a value-like binding that ends up in
//! render state, or an action that ends up as a bound callable. Keeping the
//! two apart in the type means a callable can never be stored as state.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::context::Context;
use crate::error::{kind_of, Error, Result};
use crate::reactive::Cell;

/// An imperative action. Receives the resolved cells and call arguments.
pub type ActionFn = dyn Fn(&ActionScope, &[Value]) -> Result<()>;

/// A zero-argument computation, wrapped into a derived cell on activation.
pub type ComputeFn = dyn Fn() -> Value;

/// One named entry produced by a resolver.
#[derive(Clone)]
pub enum Binding {
    /// A literal, wrapped in a fresh cell on activation.
    Value(Value),
    /// An existing cell, shared with whoever else holds it.
    Cell(Cell<Value>),
    /// A computation over other cells.
    Derived(Rc<ComputeFn>),
    /// A callable exposed next to render state, never stored in it.
    Action(Rc<ActionFn>),
}

impl Binding {
    pub fn is_action(&self) -> bool {
        matches!(self, Binding::Action(_))
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Value(value)
    }
}

impl From<Cell<Value>> for Binding {
    fn from(cell: Cell<Value>) -> Self {
        Binding::Cell(cell)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Binding::Cell(cell) => f.debug_tuple("Cell").field(&cell.id()).finish(),
            Binding::Derived(_) => f.write_str("Derived(..)"),
            Binding::Action(_) => f.write_str("Action(..)"),
        }
    }
}

/// The mapping a resolver returns, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    entries: IndexMap<String, Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every cell of the context, bound under its own name.
    pub fn from_context(context: &Context) -> Self {
        context
            .iter()
            .fold(Self::new(), |bindings, (name, cell)| {
                bindings.cell(name.clone(), cell.clone())
            })
    }

    /// Literal bindings from a JSON object.
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
            .fold(Self::new(), |bindings, (name, value)| bindings.value(name, value)))
    }

    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) {
        self.entries.insert(name.into(), binding);
    }

    pub fn value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, Binding::Value(value.into()));
        self
    }

    /// Bind a serialized host value.
    ///
    /// Fails with [`Error::InvalidValue`] when the value has no JSON form.
    pub fn serialized<S: Serialize + ?Sized>(
        self,
        name: impl Into<String>,
        value: &S,
    ) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(Error::invalid_value)?;
        Ok(self.value(name, value))
    }

    pub fn cell(mut self, name: impl Into<String>, cell: Cell<Value>) -> Self {
        self.insert(name, Binding::Cell(cell));
        self
    }

    pub fn derived<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.insert(name, Binding::Derived(Rc::new(compute)));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ActionScope, &[Value]) -> Result<()> + 'static,
    {
        self.insert(name, Binding::Action(Rc::new(action)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.entries.iter().map(|(name, binding)| (name.as_str(), binding))
    }
}

impl IntoIterator for Bindings {
    type Item = (String, Binding);
    type IntoIter = indexmap::map::IntoIter<String, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// What an action sees: the cells resolved for its activation and the
/// ambient context they were resolved from.
#[derive(Debug)]
pub struct ActionScope {
    cells: IndexMap<String, Cell<Value>>,
    context: Context,
}

impl ActionScope {
    pub(crate) fn new(cells: IndexMap<String, Cell<Value>>, context: Context) -> Self {
        Self { cells, context }
    }

    /// A cell bound by this activation. Derived bindings are read-only and
    /// are not reachable here.
    pub fn cell(&self, name: &str) -> Result<&Cell<Value>> {
        self.cells.get(name).ok_or_else(|| Error::missing(name))
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

/// An action closed over its activation's scope.
#[derive(Clone)]
pub struct BoundAction {
    name: String,
    action: Rc<ActionFn>,
    scope: Rc<ActionScope>,
}

impl BoundAction {
    pub(crate) fn new(name: String, action: Rc<ActionFn>, scope: Rc<ActionScope>) -> Self {
        Self {
            name,
            action,
            scope,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<()> {
        (self.action)(&self.scope, args)
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction").field("name", &self.name).finish()
    }
}
