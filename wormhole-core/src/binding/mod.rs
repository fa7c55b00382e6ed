//! Component Bindings
//!
//! The glue between cells and a UI component instance. A [`Connector`]
//! describes what a component binds to; activating it against an ambient
//! [`Context`] yields an [`Activation`] that keeps render state in sync with
//! the bound cells until it is deactivated.
//!
//! The UI layer itself stays outside this crate. It talks to the adapter
//! through [`Connector::activate`], [`Host::request_update`],
//! [`Activation::should_update`] and [`Activation::deactivate`].

mod adapter;
mod bindings;
mod context;
mod options;

pub use adapter::{shallow_equal, Activation, Connector, Host, Props, Resolver};
pub use bindings::{ActionFn, ActionScope, Binding, Bindings, BoundAction, ComputeFn};
pub use context::{Context, ContextBuilder};
pub use options::{ConnectOptions, InitialValue, Projection};
