//! Container Adapters
//!
//! The reactive layer never touches concrete collections directly. It talks
//! to anything implementing [`Container`], a small capability interface with
//! `get`/`set`/`has`/`delete_key`/`own_keys`. Two adapters ship with the
//! crate:
//!
//! - [`Record`]: an insertion-ordered key-value map addressed by `Key::Name`
//! - [`Sequence`]: an indexable list addressed by `Key::Index`, with a
//!   writable `Key::Length`
//!
//! Adapters are plain data structures. They do not track or trigger
//! anything; that is the job of [`Observed`](crate::reactive::Observed).

mod record;
mod sequence;

use std::fmt;

use crate::error::Result;
use crate::value::{Key, Value};

pub use record::Record;
pub use sequence::Sequence;

/// The broad shape of a container.
///
/// The shape decides which synthetic key stands for "the key set changed":
/// `Key::Iterate` for records, `Key::Length` for sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Record,
    Sequence,
}

impl Shape {
    /// The synthetic key enumeration subscribes to.
    pub fn enumeration_key(self) -> Key {
        match self {
            Shape::Record => Key::Iterate,
            Shape::Sequence => Key::Length,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Record => f.write_str("record"),
            Shape::Sequence => f.write_str("sequence"),
        }
    }
}

/// Capability interface of a container that can be observed.
pub trait Container: Send + Sync + fmt::Debug {
    fn shape(&self) -> Shape;

    /// Current value at `key`, `None` if the slot is absent.
    fn get(&self, key: &Key) -> Option<Value>;

    fn has(&self, key: &Key) -> bool;

    /// Write `value` at `key`, returning the previous value if there was one.
    fn set(&mut self, key: &Key, value: Value) -> Result<Option<Value>>;

    /// Remove `key`, returning the removed value if the slot existed.
    fn delete_key(&mut self, key: &Key) -> Result<Option<Value>>;

    /// Keys of all present slots, in iteration order.
    fn own_keys(&self) -> Vec<Key>;

    /// Number of entries (records) or the length (sequences).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
