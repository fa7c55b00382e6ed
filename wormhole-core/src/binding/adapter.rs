//! Binding Adapter
//!
//! The adapter connects a UI component instance to cells. The host UI layer
//! drives it through three calls:
//!
//! 1. [`Connector::activate`] when the component instance is created. The
//!    resolver runs against the ambient [`Context`], every value-like binding
//!    is turned into a cell (literals get a fresh cell, computations a
//!    [`Derived`] cell), its current value is captured into render state and
//!    a `changed` subscription keeps it current.
//!
//! 2. [`Activation::should_update`] whenever the host considers re-rendering.
//!    With `pure` set, the answer is "no" unless the external props or the
//!    render state differ shallowly from what was last rendered.
//!
//! 3. [`Activation::deactivate`] when the instance is destroyed. Every
//!    subscription is removed exactly once and no render-state update happens
//!    afterwards. Dropping the activation deactivates it too.
//!
//! Changes reach the host through [`Host::request_update`] with the partial
//! render state that changed; scheduling the actual re-render is the host's
//! business.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use super::bindings::{ActionScope, Binding, Bindings, BoundAction, ComputeFn};
use super::context::Context;
use super::options::ConnectOptions;
use crate::error::Result;
use crate::reactive::{untracked, Cell, Derived, SameValue, SubscriptionSet};

/// Props and render state: binding name to value.
pub type Props = IndexMap<String, Value>;

/// Resolves the bindings of one activation from the ambient context.
pub type Resolver = dyn Fn(&Context) -> Result<Bindings>;

/// The host UI layer, as seen from the adapter.
pub trait Host {
    /// A bound cell changed; `partial` holds the new render-state entries.
    fn request_update(&self, partial: Props);
}

impl<F> Host for F
where
    F: Fn(Props),
{
    fn request_update(&self, partial: Props) {
        self(partial)
    }
}

/// Shallow (one-level) equality of two prop maps.
///
/// Both maps must have the same keys, and each entry must be the
/// [same value](SameValue) in both. Key order does not matter.
pub fn shallow_equal(a: &Props, b: &Props) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| value.same_value(other)))
}

/// A reusable description of how a component binds to cells.
#[derive(Clone)]
pub struct Connector {
    resolver: Rc<Resolver>,
    options: ConnectOptions,
}

impl Connector {
    /// Create a connector from a resolver.
    pub fn new<F>(resolver: F) -> Self
    where
        F: Fn(&Context) -> Result<Bindings> + 'static,
    {
        Self {
            resolver: Rc::new(resolver),
            options: ConnectOptions::default(),
        }
    }

    /// A connector that binds every cell of the ambient context.
    pub fn from_context() -> Self {
        Self::new(|context| Ok(Bindings::from_context(context)))
    }

    /// Replace the connector's options.
    pub fn with_options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// The options every activation of this connector uses.
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Activate one component instance that has no external props.
    pub fn activate<H>(&self, context: &Context, host: H) -> Result<Activation>
    where
        H: Host + 'static,
    {
        self.activate_with_props(context, &Props::new(), host)
    }

    /// Activate one component instance with its external props.
    ///
    /// Initial values are written into their cells first, seeded from
    /// `props`, and projections see `props` overlaid with render state.
    ///
    /// A failing resolver fails the activation before any subscription
    /// exists. A failing seed write drops every subscription made so far;
    /// there is no partially activated state.
    pub fn activate_with_props<H>(
        &self,
        context: &Context,
        props: &Props,
        host: H,
    ) -> Result<Activation>
    where
        H: Host + 'static,
    {
        let bindings = (self.resolver)(context)?;
        debug!(
            bindings = bindings.len(),
            pure = self.options.pure,
            "activating binding adapter"
        );

        let mut activation = Activation {
            shared: Rc::new(Shared {
                state: RefCell::new(Props::new()),
                props: RefCell::new(props.clone()),
                active: std::cell::Cell::new(true),
                host: Box::new(host),
                options: self.options.clone(),
            }),
            cells: IndexMap::new(),
            derived: RefCell::new(Vec::new()),
            actions: IndexMap::new(),
            subscriptions: RefCell::new(SubscriptionSet::new()),
            rendered: RefCell::new(None),
        };

        let mut actions = Vec::new();
        untracked(|| -> Result<()> {
            for (name, binding) in bindings {
                match binding {
                    Binding::Value(value) => activation.bind_cell(name, Cell::new(value), props)?,
                    Binding::Cell(cell) => activation.bind_cell(name, cell, props)?,
                    Binding::Derived(compute) => activation.bind_derived(name, compute),
                    Binding::Action(action) => actions.push((name, action)),
                }
            }
            Ok(())
        })?;

        let scope = Rc::new(ActionScope::new(activation.cells.clone(), context.clone()));
        for (name, action) in actions {
            let bound = BoundAction::new(name.clone(), action, Rc::clone(&scope));
            activation.actions.insert(name, bound);
        }

        Ok(activation)
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Cell<Value> {
    /// A connector binding this cell under `name`.
    pub fn connect_as(&self, name: impl Into<String>) -> Connector {
        let cell = self.clone();
        let name = name.into();
        Connector::new(move |_| Ok(Bindings::new().cell(name.clone(), cell.clone())))
    }
}

/// State reachable from subscription callbacks.
struct Shared {
    state: RefCell<Props>,
    /// External props last handed to the adapter.
    props: RefCell<Props>,
    active: std::cell::Cell<bool>,
    host: Box<dyn Host>,
    options: ConnectOptions,
}

impl Shared {
    /// Project `value` against the external props overlaid with render state.
    fn project(&self, name: &str, value: &Value) -> Value {
        if !self.options.has_projection() {
            return value.clone();
        }
        let mut scope = self.props.borrow().clone();
        scope.extend(
            self.state
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self.options.project(name, value, &scope)
    }

    fn receive(&self, name: &str, next: &Value) {
        if !self.active.get() {
            trace!(binding = name, "change after deactivation ignored");
            return;
        }

        let projected = self.project(name, next);
        {
            let mut state = self.state.borrow_mut();
            if self.options.pure
                && state
                    .get(name)
                    .is_some_and(|current| current.same_value(&projected))
            {
                trace!(binding = name, "projected value unchanged, update skipped");
                return;
            }
            state.insert(name.to_owned(), projected.clone());
        }

        trace!(binding = name, "requesting update");
        let mut partial = Props::new();
        partial.insert(name.to_owned(), projected);
        self.host.request_update(partial);
    }
}

/// What was last handed to the renderer.
struct Rendered {
    props: Props,
    state: Props,
}

/// The adapter state of one activated component instance.
pub struct Activation {
    shared: Rc<Shared>,
    cells: IndexMap<String, Cell<Value>>,
    derived: RefCell<Vec<Derived<Value>>>,
    actions: IndexMap<String, BoundAction>,
    subscriptions: RefCell<SubscriptionSet>,
    rendered: RefCell<Option<Rendered>>,
}

impl Activation {
    fn bind_cell(&mut self, name: String, cell: Cell<Value>, props: &Props) -> Result<()> {
        if let Some(seed) = self.shared.options.initial_for(&name, props) {
            trace!(binding = %name, "seeding cell from initial value");
            cell.write(seed)?;
        }
        let initial = self.shared.project(&name, &cell.read());
        self.shared.state.borrow_mut().insert(name.clone(), initial);

        let subscription = cell.on_changed(self.receiver(name.clone()));
        self.subscriptions.get_mut().push(subscription);
        self.cells.insert(name, cell);
        Ok(())
    }

    fn bind_derived(&mut self, name: String, compute: Rc<ComputeFn>) {
        let derived = Derived::new(move || compute());
        let initial = self.shared.project(&name, &derived.read());
        self.shared.state.borrow_mut().insert(name.clone(), initial);

        let subscription = derived.on_changed(self.receiver(name));
        self.subscriptions.get_mut().push(subscription);
        self.derived.get_mut().push(derived);
    }

    fn receiver(&self, name: String) -> impl Fn(&Value, &Value) + 'static {
        let shared: Weak<Shared> = Rc::downgrade(&self.shared);
        move |next, _previous| {
            if let Some(shared) = shared.upgrade() {
                shared.receive(&name, next);
            }
        }
    }

    /// Current render state.
    pub fn state(&self) -> Props {
        self.shared.state.borrow().clone()
    }

    /// One render-state entry.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.shared.state.borrow().get(name).cloned()
    }

    /// Bound actions, by binding name.
    pub fn actions(&self) -> &IndexMap<String, BoundAction> {
        &self.actions
    }

    /// One bound action.
    pub fn action(&self, name: &str) -> Option<&BoundAction> {
        self.actions.get(name)
    }

    /// The writable cell behind a value binding.
    pub fn cell(&self, name: &str) -> Option<&Cell<Value>> {
        self.cells.get(name)
    }

    /// Number of subscriptions this activation currently holds.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Whether the activation still follows its cells.
    pub fn is_active(&self) -> bool {
        self.shared.active.get()
    }

    /// The options this activation was created with.
    pub fn options(&self) -> &ConnectOptions {
        &self.shared.options
    }

    /// Props for the wrapped component: external props overlaid with render
    /// state. Records what was rendered for the purity gate, and keeps
    /// `external` as the props later projections see.
    pub fn render_props(&self, external: &Props) -> Props {
        *self.shared.props.borrow_mut() = external.clone();
        let state = self.state();
        let mut merged = external.clone();
        merged.extend(state.iter().map(|(k, v)| (k.clone(), v.clone())));

        *self.rendered.borrow_mut() = Some(Rendered {
            props: external.clone(),
            state,
        });
        merged
    }

    /// Whether the host should re-render with `next_external` props.
    ///
    /// Always `true` when the connector is not pure or nothing has been
    /// rendered yet.
    pub fn should_update(&self, next_external: &Props) -> bool {
        if !self.shared.options.pure {
            return true;
        }
        let rendered = self.rendered.borrow();
        let Some(rendered) = rendered.as_ref() else {
            return true;
        };
        let state = self.shared.state.borrow();
        !(shallow_equal(&rendered.props, next_external) && shallow_equal(&rendered.state, &state))
    }

    /// Tear down: remove every subscription exactly once and stop updating
    /// render state. Calling it again does nothing.
    pub fn deactivate(&self) {
        if !self.shared.active.replace(false) {
            return;
        }

        let mut subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        let removed = subscriptions.len();
        subscriptions.unsubscribe_all();

        let derived = std::mem::take(&mut *self.derived.borrow_mut());
        for cell in &derived {
            cell.dispose();
        }

        debug!(subscriptions = removed, "binding adapter deactivated");
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("state", &*self.shared.state.borrow())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("subscriptions", &self.subscription_count())
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
