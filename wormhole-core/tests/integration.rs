//! Integration Tests for the Reactive Core
//!
//! These tests verify that cells, derived cells and the binding adapter work
//! together the way a host UI layer uses them.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};

use wormhole_core::binding::{Bindings, ConnectOptions, Connector, Context, Props};
use wormhole_core::reactive::{Cell, Derived, EventKind};
use wormhole_core::Error;

type Updates = Rc<RefCell<Vec<Props>>>;

fn recorder() -> (Updates, impl Fn(Props) + 'static) {
    let updates: Updates = Rc::new(RefCell::new(Vec::new()));
    let sink = updates.clone();
    (updates, move |partial: Props| sink.borrow_mut().push(partial))
}

fn props(pairs: &[(&str, Value)]) -> Props {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Writing then reading returns the written value.
#[test]
fn write_then_read_round_trips() {
    let cell = Cell::new(json!(null));
    for value in [json!(1), json!("x"), json!([1, 2]), json!({"k": false})] {
        cell.write(value.clone()).unwrap();
        assert_eq!(cell.read(), value);
    }
}

/// Two equal writes: `written` twice, `changed` once.
#[test]
fn repeated_write_changes_once() {
    let cell = Cell::new(json!(0));
    let written = Rc::new(std::cell::Cell::new(0));
    let changed = Rc::new(std::cell::Cell::new(0));

    let (w, c) = (written.clone(), changed.clone());
    let _ws = cell.on_written(move |_, _| w.set(w.get() + 1));
    let _cs = cell.on_changed(move |_, _| c.set(c.get() + 1));

    cell.write(json!({"a": 1})).unwrap();
    cell.write(json!({"a": 1})).unwrap();

    assert_eq!(written.get(), 2);
    assert_eq!(changed.get(), 1);
}

/// The canonical mount / change / unmount scenario.
#[test]
fn activate_update_deactivate() {
    let cell = Cell::new(json!(1));
    let (updates, host) = recorder();
    let captured = cell.clone();
    let connector = Connector::new(move |_| Ok(Bindings::new().cell("a", captured.clone())));

    let activation = connector.activate(&Context::new(), host).unwrap();
    assert_eq!(activation.state(), props(&[("a", json!(1))]));

    cell.write(json!(2)).unwrap();
    assert_eq!(*updates.borrow(), vec![props(&[("a", json!(2))])]);

    activation.deactivate();
    cell.write(json!(3)).unwrap();
    assert_eq!(updates.borrow().len(), 1);
}

/// Pure adapter: an equal write requests nothing and the gate says "no".
#[test]
fn pure_gate_skips_equal_write() {
    let cell = Cell::new(json!(1));
    let (updates, host) = recorder();
    let activation = cell.connect_as("a").activate(&Context::new(), host).unwrap();
    let external = Props::new();
    activation.render_props(&external);

    cell.write(json!(1)).unwrap();

    assert!(updates.borrow().is_empty());
    assert!(!activation.should_update(&external));
}

/// An impure adapter re-renders even when nothing differs.
#[test]
fn impure_gate_always_updates() {
    let cell = Cell::new(json!({"text": "hello"}));
    let (_, host) = recorder();
    let activation = cell
        .connect_as("a")
        .with_options(ConnectOptions::new().pure(false))
        .activate(&Context::new(), host)
        .unwrap();
    let external = Props::new();
    activation.render_props(&external);

    assert!(activation.should_update(&external));
}

/// Literal and computed bindings end up as plain values in render state.
#[test]
fn literal_and_derived_bindings_resolve_to_values() {
    let (_, host) = recorder();
    let connector = Connector::new(|_| Ok(Bindings::new().value("a", "x").derived("fn", || json!(1))));

    let activation = connector.activate(&Context::new(), host).unwrap();
    assert_eq!(activation.state(), props(&[("a", json!("x")), ("fn", json!(1))]));
}

/// A derived binding over context cells follows them.
#[test]
fn derived_binding_tracks_context_cells() {
    let context = Context::builder().provide("first", "Ada").provide("last", "Lovelace").build();
    let (updates, host) = recorder();
    let connector = Connector::new(|ctx| {
        let (first, last) = (ctx.get("first")?, ctx.get("last")?);
        Ok(Bindings::new().derived("full", move || {
            let first = first.read();
            let last = last.read();
            json!(format!(
                "{} {}",
                first.as_str().unwrap_or_default(),
                last.as_str().unwrap_or_default()
            ))
        }))
    });

    let activation = connector.activate(&context, host).unwrap();
    assert_eq!(activation.get("full"), Some(json!("Ada Lovelace")));

    context.get("last").unwrap().write(json!("King")).unwrap();
    assert_eq!(activation.get("full"), Some(json!("Ada King")));
    assert_eq!(*updates.borrow(), vec![props(&[("full", json!("Ada King"))])]);

    activation.deactivate();
    assert_eq!(
        context.get("first").unwrap().listener_count(EventKind::Changed),
        0
    );
}

/// Strict ambient lookups fail activation; optional lookups do not.
#[test]
fn missing_ambient_binding_policy() {
    let context = Context::builder().provide("present", 1).build();
    let (_, host) = recorder();
    let strict = Connector::new(|ctx| Ok(Bindings::new().cell("absent", ctx.get("absent")?)));
    assert_eq!(
        strict.activate(&context, host).unwrap_err(),
        Error::MissingDependency {
            name: "absent".to_string()
        }
    );

    let (_, host) = recorder();
    let lenient = Connector::new(|ctx| {
        let absent = ctx.try_get("absent").map(|cell| cell.read()).unwrap_or(Value::Null);
        Ok(Bindings::new().value("absent", absent))
    });
    let activation = lenient.activate(&context, host).unwrap();
    assert_eq!(activation.get("absent"), Some(Value::Null));
}

/// A resolver producing a non-object is rejected before anything subscribes.
#[test]
fn non_object_resolver_output_is_invalid_shape() {
    let context = Context::builder().provide("a", 1).build();
    let (_, host) = recorder();
    let connector = Connector::new(|_| Bindings::from_value(json!(["not", "a", "map"])));

    let err = connector.activate(&context, host).unwrap_err();
    assert!(matches!(err, Error::InvalidShape { expected: "object", found: "array" }));
    assert_eq!(context.get("a").unwrap().listener_count(EventKind::Changed), 0);
}

/// Actions are bound to the activation's cells.
#[test]
fn bound_action_writes_through_scope() {
    let context = Context::from_value(json!({"counter": 1})).unwrap();
    let (updates, host) = recorder();
    let connector = Connector::new(|ctx| {
        Ok(Bindings::new()
            .cell("counter", ctx.get("counter")?)
            .action("increase", |scope, _args| {
                scope
                    .cell("counter")?
                    .update(|v| json!(v.as_i64().unwrap_or(0) + 1))
            }))
    });

    let activation = connector.activate(&context, host).unwrap();
    assert!(activation.get("increase").is_none());

    activation.action("increase").unwrap().call(&[]).unwrap();
    assert_eq!(activation.get("counter"), Some(json!(2)));
    assert_eq!(*updates.borrow(), vec![props(&[("counter", json!(2))])]);
}

/// Activations bound to the context registry share its cells.
#[test]
fn from_context_shares_cells_between_activations() {
    let context = Context::from_value(json!({"a": "hello"})).unwrap();
    let (first_updates, first_host) = recorder();
    let (second_updates, second_host) = recorder();

    let first = Connector::from_context().activate(&context, first_host).unwrap();
    let second = Connector::from_context().activate(&context, second_host).unwrap();

    first.cell("a").unwrap().write(json!("world")).unwrap();

    assert_eq!(second.get("a"), Some(json!("world")));
    assert_eq!(first_updates.borrow().len(), 1);
    assert_eq!(second_updates.borrow().len(), 1);
}

/// A derived cell reading two cells recomputes once per change of either.
#[test]
fn derived_recomputes_only_for_its_reads() {
    let a = Cell::new(1);
    let b = Cell::new(2);
    let unrelated = Cell::new(0);
    let (ra, rb) = (a.clone(), b.clone());
    let product = Derived::new(move || ra.read() * rb.read());

    a.write(3).unwrap();
    b.write(4).unwrap();
    unrelated.write(9).unwrap();

    assert_eq!(product.read(), 12);
    assert_eq!(product.recompute_count(), 2);
}

/// A handler that writes back into its own trigger converges when the
/// write-back stops changing the value, and is stopped with an error when it
/// never does.
#[test]
fn nested_write_back_policy() {
    // B mirrors A; B's handler normalizes A to lowercase.
    let a = Cell::new("start".to_string());
    let b = Cell::new(String::new());
    let (a_src, b_dst) = (a.clone(), b.clone());
    let _mirror = a.on_changed(move |next: &String, _| {
        b_dst.write(next.clone()).unwrap();
    });
    let a_dst = a_src.clone();
    let _normalize = b.on_changed(move |next: &String, _| {
        a_dst.write(next.to_lowercase()).unwrap();
    });

    a_src.write("HELLO".to_string()).unwrap();
    assert_eq!(a.read(), "hello");
    assert_eq!(b.read(), "hello");

    // A divergent cycle: every pass increments, so it never settles.
    let x = Cell::with_reentry_limit(0, 4);
    let y = Cell::new(0);
    let errors = Rc::new(RefCell::new(Vec::new()));
    let y_dst = y.clone();
    let _xy = x.on_changed(move |next: &i32, _| {
        let _ = y_dst.write(*next);
    });
    let (x_dst, sink) = (x.clone(), errors.clone());
    let _yx = y.on_changed(move |next: &i32, _| {
        if let Err(err) = x_dst.write(next + 1) {
            sink.borrow_mut().push(err);
        }
    });

    x.write(1).unwrap();
    assert_eq!(errors.borrow().len(), 1);
    assert!(matches!(
        errors.borrow()[0],
        Error::ReentrantWrite { depth: 4, .. }
    ));
    assert_eq!(x.read(), 4);
}

/// Removal handles are idempotent and final.
#[test]
fn removal_handles_are_idempotent() {
    let cell = Cell::new(0);
    let calls = Rc::new(std::cell::Cell::new(0));
    let counter = calls.clone();
    let sub = cell.on_changed(move |_, _| counter.set(counter.get() + 1));

    sub.unsubscribe();
    sub.unsubscribe();
    for i in 1..5 {
        cell.write(i).unwrap();
    }

    assert_eq!(calls.get(), 0);
    assert!(!sub.is_active());
}

/// A seeded context cell is seen by every other activation sharing it.
#[test]
fn initial_value_seeds_shared_context_cell() {
    let context = Context::from_value(json!({"theme": "light"})).unwrap();
    let (observer_updates, observer_host) = recorder();
    let observer = Connector::from_context().activate(&context, observer_host).unwrap();

    let (_, host) = recorder();
    let seeded = Connector::from_context()
        .with_options(ConnectOptions::new().initial_value_with("theme", |props| {
            props.get("theme").cloned().unwrap_or(Value::Null)
        }))
        .activate_with_props(&context, &props(&[("theme", json!("dark"))]), host)
        .unwrap();

    assert_eq!(seeded.get("theme"), Some(json!("dark")));
    assert_eq!(observer.get("theme"), Some(json!("dark")));
    assert_eq!(*observer_updates.borrow(), vec![props(&[("theme", json!("dark"))])]);
}
