//! Record adapter: insertion-ordered named entries.

use std::sync::Arc;

use indexmap::IndexMap;

use super::{Container, Shape};
use crate::error::{ReactiveError, Result};
use crate::value::{Key, Value};

/// An object-like container with named keys.
#[derive(Debug, Clone, Default)]
pub struct Record {
    entries: IndexMap<Arc<str>, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(name, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Arc<str>>,
        V: Into<Value>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn name<'k>(key: &'k Key) -> Result<&'k Arc<str>> {
        match key {
            Key::Name(name) => Ok(name),
            other => Err(ReactiveError::UnsupportedKey {
                shape: Shape::Record,
                key: other.clone(),
            }),
        }
    }
}

impl Container for Record {
    fn shape(&self) -> Shape {
        Shape::Record
    }

    fn get(&self, key: &Key) -> Option<Value> {
        match key {
            Key::Name(name) => self.entries.get(name).cloned(),
            _ => None,
        }
    }

    fn has(&self, key: &Key) -> bool {
        match key {
            Key::Name(name) => self.entries.contains_key(name),
            _ => false,
        }
    }

    fn set(&mut self, key: &Key, value: Value) -> Result<Option<Value>> {
        let name = Self::name(key)?;
        Ok(self.entries.insert(Arc::clone(name), value))
    }

    fn delete_key(&mut self, key: &Key) -> Result<Option<Value>> {
        let name = Self::name(key)?;
        Ok(self.entries.shift_remove(name))
    }

    fn own_keys(&self) -> Vec<Key> {
        self.entries.keys().map(|k| Key::Name(Arc::clone(k))).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_returns_previous_value() {
        let mut record = Record::new();
        assert_eq!(record.set(&Key::from("a"), Value::from(1)).unwrap(), None);
        assert_eq!(
            record.set(&Key::from("a"), Value::from(2)).unwrap(),
            Some(Value::from(1))
        );
        assert_eq!(record.get(&Key::from("a")), Some(Value::from(2)));
    }

    #[test]
    fn delete_keeps_remaining_order() {
        let mut record = Record::from_pairs([("a", 1), ("b", 2), ("c", 3)]);
        assert_eq!(record.delete_key(&Key::from("b")).unwrap(), Some(Value::from(2)));
        assert_eq!(record.own_keys(), vec![Key::from("a"), Key::from("c")]);
        assert_eq!(record.delete_key(&Key::from("b")).unwrap(), None);
    }

    #[test]
    fn rejects_sequence_keys() {
        let mut record = Record::new();
        assert!(matches!(
            record.set(&Key::Index(0), Value::Null),
            Err(ReactiveError::UnsupportedKey { shape: Shape::Record, .. })
        ));
        assert!(!record.has(&Key::Length));
    }
}
