//! Sequence adapter: an indexable list with holes.
//!
//! Slots are `Option<Value>` so that deleting an index leaves a hole instead
//! of shifting later elements. Writing past the end grows the sequence and
//! fills the gap with holes; writing `Key::Length` truncates or extends.
//! Neither may grow the sequence past [`Sequence::MAX_LEN`].

use super::{Container, Shape};
use crate::error::{ReactiveError, Result};
use crate::value::{Key, Value};

/// An array-like container.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    slots: Vec<Option<Value>>,
}

impl Sequence {
    /// Longest sequence a raw container accepts.
    pub const MAX_LEN: usize = u32::MAX as usize;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            slots: values.into_iter().map(|v| Some(v.into())).collect(),
        }
    }

    /// Truncate or extend to `len`, failing instead of aborting when the
    /// slots cannot be allocated.
    fn resize(&mut self, len: usize) -> Result<()> {
        if len > Self::MAX_LEN {
            return Err(ReactiveError::InvalidLength(Value::from(len)));
        }
        if let Some(extra) = len.checked_sub(self.slots.len()) {
            self.slots
                .try_reserve_exact(extra)
                .map_err(|_| ReactiveError::InvalidLength(Value::from(len)))?;
        }
        self.slots.resize(len, None);
        Ok(())
    }
}

impl Container for Sequence {
    fn shape(&self) -> Shape {
        Shape::Sequence
    }

    fn get(&self, key: &Key) -> Option<Value> {
        match key {
            Key::Index(i) => self.slots.get(*i).cloned().flatten(),
            Key::Length => Some(Value::from(self.slots.len())),
            _ => None,
        }
    }

    fn has(&self, key: &Key) -> bool {
        match key {
            Key::Index(i) => matches!(self.slots.get(*i), Some(Some(_))),
            Key::Length => true,
            _ => false,
        }
    }

    fn set(&mut self, key: &Key, value: Value) -> Result<Option<Value>> {
        match key {
            Key::Index(i) => {
                if *i >= self.slots.len() {
                    let len = i
                        .checked_add(1)
                        .filter(|len| *len <= Self::MAX_LEN)
                        .ok_or_else(|| ReactiveError::UnsupportedKey {
                            shape: Shape::Sequence,
                            key: key.clone(),
                        })?;
                    self.resize(len)?;
                }
                Ok(self.slots[*i].replace(value))
            }
            Key::Length => {
                let len = value
                    .as_index()
                    .ok_or_else(|| ReactiveError::InvalidLength(value.clone()))?;
                let previous = self.slots.len();
                self.resize(len)?;
                Ok(Some(Value::from(previous)))
            }
            other => Err(ReactiveError::UnsupportedKey {
                shape: Shape::Sequence,
                key: other.clone(),
            }),
        }
    }

    fn delete_key(&mut self, key: &Key) -> Result<Option<Value>> {
        match key {
            Key::Index(i) => Ok(self.slots.get_mut(*i).and_then(Option::take)),
            other => Err(ReactiveError::UnsupportedKey {
                shape: Shape::Sequence,
                key: other.clone(),
            }),
        }
    }

    fn own_keys(&self) -> Vec<Key> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| Key::Index(i))
            .collect()
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}
