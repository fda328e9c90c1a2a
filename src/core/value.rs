//! # Transportable Values
//!
//! Arguments and results cross the wire as [`Value`], a closed sum type every
//! codec can encode. Service methods take and return ordinary Rust types;
//! [`IntoValue`] and [`FromValue`] convert at the boundary.
//!
//! Integer conversions are range checked and may cross between signed and
//! unsigned storage when the number fits. Integers never convert to floats
//! implicitly.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A value that can be carried in a request or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short type name used in mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True unless a NaN or infinity appears anywhere inside.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            Value::List(items) => items.iter().all(Value::is_finite),
            Value::Map(entries) => entries.values().all(Value::is_finite),
            _ => true,
        }
    }
}

/// Failure converting a [`Value`] into a Rust type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },
}

/// Conversion into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Conversion out of a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

fn mismatch(expected: &'static str, found: &Value) -> ValueError {
    ValueError::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

macro_rules! impl_signed {
    ($($ty:ty),*) => {$(
        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::Int(self as i64)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, ValueError> {
                let out_of_range = |v: String| ValueError::OutOfRange {
                    value: v,
                    target: stringify!($ty),
                };
                match value {
                    Value::Int(i) => <$ty>::try_from(i).map_err(|_| out_of_range(i.to_string())),
                    Value::UInt(u) => <$ty>::try_from(u).map_err(|_| out_of_range(u.to_string())),
                    other => Err(mismatch("int", &other)),
                }
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {$(
        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::UInt(self as u64)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, ValueError> {
                let out_of_range = |v: String| ValueError::OutOfRange {
                    value: v,
                    target: stringify!($ty),
                };
                match value {
                    Value::UInt(u) => <$ty>::try_from(u).map_err(|_| out_of_range(u.to_string())),
                    Value::Int(i) => <$ty>::try_from(i).map_err(|_| out_of_range(i.to_string())),
                    other => Err(mismatch("uint", &other)),
                }
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(f),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        let f = f64::from_value(value)?;
        if f.is_finite() && f.abs() > f64::from(f32::MAX) {
            return Err(ValueError::OutOfRange {
                value: f.to_string(),
                target: "f32",
            });
        }
        Ok(f as f32)
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Str(self.to_owned())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl IntoValue for Bytes {
    fn into_value(self) -> Value {
        Value::Bytes(self.to_vec())
    }
}

impl FromValue for Bytes {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bytes(b) => Ok(Bytes::from(b)),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k, v.into_value()))
                .collect(),
        )
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch("map", &other)),
        }
    }
}

/// Build an argument list from anything implementing [`IntoValue`].
///
/// ```rust
/// use network_rpc::{rpc_args, Value};
///
/// let args = rpc_args![10i64, "x", true];
/// assert_eq!(args, vec![Value::Int(10), Value::Str("x".into()), Value::Bool(true)]);
/// ```
#[macro_export]
macro_rules! rpc_args {
    () => { ::std::vec::Vec::<$crate::core::value::Value>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::core::value::IntoValue::into_value($arg)),+]
    };
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn integers_cross_signedness_when_they_fit() {
        assert_eq!(i32::from_value(Value::UInt(7)).unwrap(), 7);
        assert_eq!(u8::from_value(Value::Int(255)).unwrap(), 255);
        assert!(matches!(
            u8::from_value(Value::Int(-1)),
            Err(ValueError::OutOfRange { target: "u8", .. })
        ));
        assert!(matches!(
            i8::from_value(Value::Int(300)),
            Err(ValueError::OutOfRange { .. })
        ));
    }

    #[test]
    fn ints_do_not_become_floats() {
        assert_eq!(
            f64::from_value(Value::Int(1)),
            Err(ValueError::TypeMismatch {
                expected: "float",
                found: "int"
            })
        );
    }

    #[test]
    fn f32_rejects_values_beyond_its_range() {
        assert_eq!(f32::from_value(Value::Float(1.5)).unwrap(), 1.5);
        assert!(f32::from_value(Value::Float(f64::INFINITY))
            .unwrap()
            .is_infinite());
        assert!(matches!(
            f32::from_value(Value::Float(1e300)),
            Err(ValueError::OutOfRange { target: "f32", .. })
        ));
    }

    #[test]
    fn non_finite_floats_are_found_when_nested() {
        assert!(Value::List(vec![Value::Float(1.0), Value::Null]).is_finite());
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), Value::List(vec![Value::Float(f64::NAN)]));
        assert!(!Value::Map(map).is_finite());
    }

    #[test]
    fn option_maps_null() {
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(Value::Int(3)).unwrap(), Some(3));
        assert_eq!(None::<i64>.into_value(), Value::Null);
    }

    #[test]
    fn nested_collections_convert() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), vec![1i64, 2]);
        let value = map.clone().into_value();
        assert_eq!(BTreeMap::<String, Vec<i64>>::from_value(value).unwrap(), map);
    }

    #[test]
    fn list_element_mismatch_is_reported() {
        let value = Value::List(vec![Value::Int(1), Value::Str("two".into())]);
        assert!(Vec::<i64>::from_value(value).is_err());
    }
}
