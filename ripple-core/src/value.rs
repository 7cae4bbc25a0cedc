//! Values and Keys
//!
//! Everything stored in an observed container is a [`Value`]. Nested
//! containers are stored by handle ([`Value::Container`]), never inline, so
//! the same container can be reachable from several parents (or from itself).
//!
//! A [`Key`] addresses one slot of a container. Besides the concrete keys
//! (`Name` for records, `Index` for sequences) there are keys that mostly
//! exist to carry subscriptions:
//!
//! - `Length`: the length of a sequence; readable and writable, and also the
//!   key that enumeration of a sequence subscribes to
//! - `Iterate`: the key set of a record; never holds data
//! - `Value`: the output of a computed value; never holds data

use std::fmt;
use std::sync::Arc;

use crate::reactive::ContainerId;

/// A dynamically typed value held by a container.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent slot, or a computation that returned nothing.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(Arc<str>),
    /// A nested container, compared by identity.
    Container(ContainerId),
}

impl Value {
    /// Strict identity comparison used to decide whether a write changed
    /// anything.
    ///
    /// Numbers compare by `==`, except that two NaNs are considered the same
    /// value. Text compares by content and containers by handle.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Container(a), Value::Container(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<ContainerId> {
        match self {
            Value::Container(id) => Some(*id),
            _ => None,
        }
    }

    /// Interpret the value as a sequence length or index.
    ///
    /// Only non-negative whole numbers that are exactly representable
    /// (up to 2^53 - 1) qualify; larger numbers would saturate.
    pub fn as_index(&self) -> Option<usize> {
        const MAX_EXACT: f64 = 9_007_199_254_740_991.0;
        match self {
            Value::Number(n) if (0.0..=MAX_EXACT).contains(n) && n.fract() == 0.0 => {
                usize::try_from(*n as u64).ok()
            }
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Container(id) => write!(f, "<container {id:?}>"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Text(s)
    }
}

impl From<ContainerId> for Value {
    fn from(id: ContainerId) -> Self {
        Value::Container(id)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Address of a slot (or synthetic slot) inside a reactive target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Named entry of a record.
    Name(Arc<str>),
    /// Position inside a sequence.
    Index(usize),
    /// Length of a sequence. Also the enumeration key of sequences.
    Length,
    /// Enumeration of a record's key set.
    Iterate,
    /// Output of a computed value.
    Value,
}

impl Key {
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Key::Name(name.into())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(i) => write!(f, "[{i}]"),
            Key::Length => f.write_str("length"),
            Key::Iterate => f.write_str("<iterate>"),
            Key::Value => f.write_str("<value>"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(Arc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(Arc::from(name))
    }
}

impl From<Arc<str>> for Key {
    fn from(name: Arc<str>) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_the_same_value_as_nan() {
        let nan = Value::Number(f64::NAN);
        assert!(nan.same_value(&Value::Number(f64::NAN)));
        assert_eq!(nan, Value::Number(f64::NAN));
    }

    #[test]
    fn different_variants_are_never_the_same() {
        assert!(!Value::Undefined.same_value(&Value::Null));
        assert!(!Value::from(0).same_value(&Value::from(false)));
        assert!(!Value::from("1").same_value(&Value::from(1)));
    }

    #[test]
    fn text_compares_by_content() {
        assert_eq!(Value::from("abc"), Value::from(String::from("abc")));
    }

    #[test]
    fn as_index_accepts_only_whole_non_negative_numbers() {
        assert_eq!(Value::from(3).as_index(), Some(3));
        assert_eq!(Value::from(0.0).as_index(), Some(0));
        assert_eq!(Value::from(-1).as_index(), None);
        assert_eq!(Value::from(1.5).as_index(), None);
        assert_eq!(Value::Number(f64::INFINITY).as_index(), None);
        assert_eq!(Value::from(1e300).as_index(), None);
        assert_eq!(Value::from("2").as_index(), None);
    }

    #[test]
    fn option_maps_none_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(2)), Value::Number(2.0));
    }

    #[test]
    fn key_display() {
        assert_eq!(Key::from("foo").to_string(), "foo");
        assert_eq!(Key::Index(2).to_string(), "[2]");
        assert_eq!(Key::Length.to_string(), "length");
    }
}
