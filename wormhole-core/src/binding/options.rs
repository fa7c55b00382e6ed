//! Connector configuration.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use super::adapter::Props;

/// Per-binding projection applied before a value enters render state.
///
/// Receives the binding name, the bound value, and the external props
/// overlaid with the current render state.
pub type Projection = dyn Fn(&str, &Value, &Props) -> Value;

/// Seeds a bound cell at activation from the external props.
pub type InitialValue = dyn Fn(&Props) -> Value;

/// Options for a [`Connector`](super::Connector).
///
/// The serializable part can be loaded from host configuration:
///
/// ```rust
/// use wormhole_core::binding::ConnectOptions;
///
/// let options: ConnectOptions = serde_json::from_str(r#"{ "pure": false }"#).unwrap();
/// assert!(!options.pure);
/// ```
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectOptions {
    /// Gate updates on shallow equality of props and render state.
    pub pure: bool,

    #[serde(skip)]
    select: Option<Rc<Projection>>,

    #[serde(skip)]
    initial: IndexMap<String, Rc<InitialValue>>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            pure: true,
            select: None,
            initial: IndexMap::new(),
        }
    }
}

impl ConnectOptions {
    /// Pure options with no projection and no initial values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn the purity gate on or off.
    pub fn pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    /// Project every bound value before it is stored in render state.
    pub fn select<F>(mut self, select: F) -> Self
    where
        F: Fn(&str, &Value, &Props) -> Value + 'static,
    {
        self.select = Some(Rc::new(select));
        self
    }

    /// Write `value` into the cell bound as `name` when activating, before
    /// its state is captured.
    pub fn initial_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.initial_value_with(name, move |_| value.clone())
    }

    /// Like [`initial_value`](Self::initial_value), computed from the
    /// external props the component is activated with.
    pub fn initial_value_with<F>(mut self, name: impl Into<String>, seed: F) -> Self
    where
        F: Fn(&Props) -> Value + 'static,
    {
        self.initial.insert(name.into(), Rc::new(seed));
        self
    }

    pub(crate) fn project(&self, name: &str, value: &Value, scope: &Props) -> Value {
        match &self.select {
            Some(select) => select(name, value, scope),
            None => value.clone(),
        }
    }

    /// Whether a projection is configured.
    pub(crate) fn has_projection(&self) -> bool {
        self.select.is_some()
    }

    pub(crate) fn initial_for(&self, name: &str, props: &Props) -> Option<Value> {
        self.initial.get(name).map(|seed| seed(props))
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("pure", &self.pure)
            .field("select", &self.select.is_some())
            .field("initial", &self.initial.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_to_pure_without_projection() {
        let options = ConnectOptions::default();
        assert!(options.pure);
        assert!(!options.has_projection());
        assert_eq!(options.project("a", &json!(1), &Props::new()), json!(1));
        assert_eq!(options.initial_for("a", &Props::new()), None);
    }

    #[test]
    fn deserializes_with_defaults() {
        let options: ConnectOptions = serde_json::from_str("{}").unwrap();
        assert!(options.pure);

        let err = serde_json::from_str::<ConnectOptions>(r#"{ "purity": true }"#);
        assert!(err.is_err());
    }

    #[test]
    fn projection_sees_binding_name() {
        let options = ConnectOptions::new().select(|name, value, _| json!(format!("{name}={value}")));
        assert_eq!(options.project("a", &json!(1), &Props::new()), json!("a=1"));
    }

    #[test]
    fn projection_sees_scope() {
        let options = ConnectOptions::new().select(|_, value, scope| {
            let unit = scope.get("unit").and_then(Value::as_str).unwrap_or("");
            json!(format!("{value}{unit}"))
        });
        let mut scope = Props::new();
        scope.insert("unit".to_string(), json!("px"));

        assert_eq!(options.project("width", &json!(4), &scope), json!("4px"));
    }

    #[test]
    fn initial_values_are_keyed_by_binding() {
        let options = ConnectOptions::new()
            .initial_value("a", 1)
            .initial_value_with("b", |props| props.get("seed").cloned().unwrap_or(Value::Null));
        let mut props = Props::new();
        props.insert("seed".to_string(), json!("from props"));

        assert_eq!(options.initial_for("a", &props), Some(json!(1)));
        assert_eq!(options.initial_for("b", &props), Some(json!("from props")));
        assert_eq!(options.initial_for("c", &props), None);
    }
}
