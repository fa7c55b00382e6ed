//! Same-Value Equality
//!
//! Cells only emit `changed` when a write replaces the stored value with one
//! that is not the "same value". Same-value differs from `PartialEq` for
//! floating point numbers:
//!
//! - `NaN` is the same value as `NaN`
//! - `+0.0` is *not* the same value as `-0.0`
//!
//! Everything else compares structurally, so two separately built but equal
//! values are the same value.

use std::rc::Rc;

use serde_json::{Number, Value};

/// A segment path into a keyed value, e.g. `["user", "name"]`.
pub type Path = smallvec::SmallVec<[String; 2]>;

/// Equality used to decide whether a write is a change.
pub trait SameValue {
    /// Whether `self` and `other` are the same value.
    fn same_value(&self, other: &Self) -> bool;

    /// Whether `self` and `other` agree at the given sub-path.
    ///
    /// Types without keyed structure ignore the path and compare whole values.
    fn same_value_at(&self, other: &Self, path: &[String]) -> bool {
        let _ = path;
        self.same_value(other)
    }
}

macro_rules! same_value_via_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SameValue for $ty {
                #[inline]
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_value_via_eq!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    String,
    str,
    &'static str,
);

macro_rules! same_value_float {
    ($($ty:ty),*) => {
        $(
            impl SameValue for $ty {
                #[inline]
                fn same_value(&self, other: &Self) -> bool {
                    if self.is_nan() && other.is_nan() {
                        return true;
                    }
                    self == other && self.is_sign_negative() == other.is_sign_negative()
                }
            }
        )*
    };
}

same_value_float!(f32, f64);

impl<T: SameValue + ?Sized> SameValue for Box<T> {
    fn same_value(&self, other: &Self) -> bool {
        (**self).same_value(other)
    }
}

impl<T: SameValue + ?Sized> SameValue for Rc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other) || (**self).same_value(other)
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: SameValue> SameValue for [T] {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

impl<T: SameValue> SameValue for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.as_slice().same_value(other.as_slice())
    }
}

impl<A: SameValue, B: SameValue> SameValue for (A, B) {
    fn same_value(&self, other: &Self) -> bool {
        self.0.same_value(&other.0) && self.1.same_value(&other.1)
    }
}

impl SameValue for Number {
    fn same_value(&self, other: &Self) -> bool {
        if self.is_f64() || other.is_f64() {
            match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.same_value(&b),
                _ => false,
            }
        } else {
            self == other
        }
    }
}

impl SameValue for Value {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.same_value(b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.same_value(b),
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(key, value)| b.get(key).is_some_and(|other| value.same_value(other)))
            }
            _ => false,
        }
    }

    fn same_value_at(&self, other: &Self, path: &[String]) -> bool {
        match (lookup(self, path), lookup(other, path)) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Resolve a sub-path inside a JSON value.
///
/// Object segments are keys, array segments are decimal indices. Returns
/// `None` as soon as a segment does not resolve.
pub fn lookup<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
