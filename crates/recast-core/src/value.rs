//! Dynamic values
//!
//! Raw input, stored field values and serialized output all travel as
//! [`Value`]. Mappings keep insertion order so that declaration order of
//! fields survives every conversion.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::instance::Instance;

/// Insertion-ordered keyed mapping
pub type Mapping = IndexMap<String, Value>;

/// A user object stored in a generic field
///
/// Objects are opaque to the engine. JSON output falls back to
/// [`CustomValue::to_structured`] when no encoder claims the object.
pub trait CustomValue: fmt::Debug + Send + Sync + 'static {
    /// Type name used in error messages
    fn type_name(&self) -> &str;

    /// Structured form of the object, if it has one
    fn to_structured(&self) -> Option<Value> {
        None
    }

    /// Downcasting hook for encoders
    fn as_any(&self) -> &dyn Any;
}

/// A dynamically typed value
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 text
    Str(String),
    /// Fixed-point decimal
    Decimal(Decimal),
    /// Calendar date
    Date(NaiveDate),
    /// Timestamp with offset
    DateTime(DateTime<FixedOffset>),
    /// Homogeneous or mixed sequence
    List(Vec<Value>),
    /// Keyed mapping
    Map(Mapping),
    /// Nested record instance
    Model(Box<Instance>),
    /// Opaque user object
    Object(Arc<dyn CustomValue>),
}

impl Value {
    /// Wrap a user object
    pub fn object<T: CustomValue>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Short name of the variant, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Decimal(_) => "decimal",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Model(_) => "model",
            Value::Object(_) => "object",
        }
    }

    /// True for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view over ints, floats and decimals
    pub fn as_f64(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Boolean view
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as mapping
    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow as nested instance
    pub fn as_model(&self) -> Option<&Instance> {
        match self {
            Value::Model(instance) => Some(instance),
            _ => None,
        }
    }

    /// Borrow as user object
    pub fn as_object(&self) -> Option<&dyn CustomValue> {
        match self {
            Value::Object(object) => Some(object.as_ref()),
            _ => None,
        }
    }

    /// Consume into a mapping
    pub fn into_mapping(self) -> Option<Mapping> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Length of strings (in chars), lists and maps
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            Value::Map(map) => Some(map.len()),
            _ => None,
        }
    }

    /// True when the value has a length of zero
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Model(a), Value::Model(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                Arc::ptr_eq(a, b)
                    || matches!(
                        (a.to_structured(), b.to_structured()),
                        (Some(x), Some(y)) if x == y
                    )
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Model(instance) => write!(f, "{instance}"),
            Value::Object(object) => write!(f, "<{}>", object.type_name()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Int(i),
                // above i64::MAX
                (None, Some(u)) => Value::Decimal(Decimal::from(u)),
                (None, None) => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt.fixed_offset())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Map(map)
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        Value::Model(Box::new(instance))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Convert a JSON object literal into a [`Mapping`]
///
/// Non-object JSON yields an empty mapping.
pub fn mapping(json: serde_json::Value) -> Mapping {
    Value::from(json).into_mapping().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Point {
        x: i64,
        y: i64,
    }

    impl CustomValue for Point {
        fn type_name(&self) -> &str {
            "Point"
        }

        fn to_structured(&self) -> Option<Value> {
            Some(Value::from(json!({"x": self.x, "y": self.y})))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_from_json_preserves_order_and_kinds() {
        let value = Value::from(json!({"b": 1, "a": 2.5, "c": [true, null, "x"]}));
        let map = value.as_map().unwrap();
        let keys: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(map["b"], Value::Int(1));
        assert_eq!(map["a"], Value::Float(2.5));
        assert_eq!(
            map["c"],
            Value::List(vec![Value::Bool(true), Value::Null, Value::from("x")])
        );
    }

    #[test]
    fn test_from_json_keeps_large_unsigned_exact() {
        let value = Value::from(json!(u64::MAX));
        assert_eq!(value, Value::Decimal(Decimal::from(u64::MAX)));
        assert_eq!(value.to_string(), "18446744073709551615");
    }

    #[test]
    fn test_int_and_float_are_distinct() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_objects_compare_by_structure() {
        let a = Value::object(Point { x: 1, y: 2 });
        let b = Value::object(Point { x: 1, y: 2 });
        let c = Value::object(Point { x: 3, y: 2 });
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "<Point>");
    }

    #[test]
    fn test_display_quotes_strings() {
        let value = Value::from(json!({"name": "Al", "tags": ["a", 1]}));
        assert_eq!(value.to_string(), r#"{"name": "Al", "tags": ["a", 1]}"#);
    }

    #[test]
    fn test_len_counts_chars() {
        assert_eq!(Value::from("héllo").len(), Some(5));
        assert_eq!(Value::from(vec![Value::Null]).len(), Some(1));
        assert_eq!(Value::Int(3).len(), None);
        assert!(Value::from("").is_empty());
    }

    #[test]
    fn test_mapping_helper_ignores_non_objects() {
        assert!(mapping(json!([1, 2])).is_empty());
        assert_eq!(mapping(json!({"a": 1})).len(), 1);
    }
}
