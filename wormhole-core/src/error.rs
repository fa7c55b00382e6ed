//! Error types for the reactive core.
//!
//! Every failure is synchronous and raised at the offending call. Nothing in
//! the core retries: there is no I/O and no transient failure.

use thiserror::Error;

use crate::reactive::CellId;

/// Errors produced by cells, contexts and binding adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A value could not be stored in a cell.
    ///
    /// The cell and its subscribers are untouched when this is returned.
    #[error("invalid cell value: {reason}")]
    InvalidValue { reason: String },

    /// A resolver, provider or context source produced something other than a
    /// mapping of names to bindings.
    #[error("invalid shape: expected {expected}, found {found}")]
    InvalidShape {
        expected: &'static str,
        found: &'static str,
    },

    /// A binding name was looked up in a context that does not provide it.
    #[error("missing dependency `{name}` in ambient context")]
    MissingDependency { name: String },

    /// A write re-entered a cell that is already dispatching too many times.
    ///
    /// This is almost always a `changed` handler writing back into one of its
    /// own (transitive) sources with a value that never converges.
    #[error("re-entrant write to cell {cell} rejected at depth {depth}")]
    ReentrantWrite { cell: CellId, depth: usize },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_value(reason: impl std::fmt::Display) -> Self {
        Self::InvalidValue {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn missing(name: impl Into<String>) -> Self {
        Self::MissingDependency { name: name.into() }
    }
}

/// Name of a JSON value's kind, for shape errors.
pub(crate) fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
