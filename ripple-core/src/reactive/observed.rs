//! Observed Containers
//!
//! An [`Observed`] is the reactive view of a raw container. Reads through it
//! subscribe the running computation; writes through it notify subscribers.
//!
//! # Modes
//!
//! - **deep** (default): nested containers reached through [`Observed::nested`]
//!   are observed with the same mode, so reads stay reactive all the way down.
//! - **shallow**: only the top-level keys are reactive; `nested` yields
//!   nothing.
//! - **readonly**: every write is rejected with [`WriteOutcome::Rejected`] and
//!   leaves the container untouched. Reads still subscribe, so a read-only
//!   view follows writes made through a writable view of the same container.
//!
//! # What Gets Tracked
//!
//! | Operation | Tracked key |
//! |---|---|
//! | `get(k)` | `k` |
//! | `has`, `keys`, `len` on a record | `Key::Iterate` |
//! | `has`, `keys`, `len` on a sequence | `Key::Length` |
//!
//! Handles are `Copy` and compare equal for the same container and mode, so
//! observing a container twice yields the same wrapper.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::runtime::Runtime;
use super::subscriber::{ContainerId, Target};
use crate::container::Shape;
use crate::error::{ReactiveError, Result};
use crate::value::{Key, Value};

/// How a container is observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserveOptions {
    pub shallow: bool,
    pub readonly: bool,
}

impl ObserveOptions {
    pub fn shallow() -> Self {
        Self {
            shallow: true,
            readonly: false,
        }
    }

    pub fn readonly() -> Self {
        Self {
            shallow: false,
            readonly: true,
        }
    }
}

/// What a write did to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// An existing key got a new value.
    Set,
    /// A new key was introduced.
    Add,
    /// A key was removed.
    Delete,
}

/// Result of a write through an [`Observed`] wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The container changed and subscribers were notified.
    Applied(MutationKind),
    /// Nothing observable changed (same value, or nothing to delete), so
    /// nobody was notified.
    Unchanged,
    /// The wrapper is read-only.
    Rejected,
}

impl WriteOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, WriteOutcome::Applied(_))
    }
}

/// Reactive view of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Observed {
    raw: ContainerId,
    options: ObserveOptions,
}

impl Runtime {
    /// Observe a raw container.
    pub fn observe(&self, raw: ContainerId, options: ObserveOptions) -> Result<Observed> {
        // Validates the handle.
        self.shape(raw)?;
        Ok(Observed { raw, options })
    }

    /// Insert a container and observe it deeply.
    pub fn reactive<C: crate::container::Container + 'static>(&self, container: C) -> Observed {
        Observed {
            raw: self.insert(container),
            options: ObserveOptions::default(),
        }
    }
}

impl Observed {
    pub(crate) fn new(raw: ContainerId, options: ObserveOptions) -> Self {
        Self { raw, options }
    }

    pub fn raw(&self) -> ContainerId {
        self.raw
    }

    pub fn options(&self) -> ObserveOptions {
        self.options
    }

    pub fn is_readonly(&self) -> bool {
        self.options.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.options.shallow
    }

    pub fn target(&self) -> Target {
        Target::Container(self.raw)
    }

    /// Same container, different mode.
    pub fn with_options(&self, options: ObserveOptions) -> Observed {
        Observed::new(self.raw, options)
    }

    pub fn shape(&self, rt: &Runtime) -> Result<Shape> {
        rt.shape(self.raw)
    }

    /// Read `key`, subscribing the running computation to it.
    ///
    /// Absent keys read as `Value::Undefined` and are still tracked, so a
    /// later `Add` of that key re-runs the reader.
    pub fn get(&self, rt: &Runtime, key: impl Into<Key>) -> Result<Value> {
        let key = key.into();
        let value = rt.read_container(self.raw, |c| c.get(&key))?;
        rt.track(self.target(), key);
        Ok(value.unwrap_or_default())
    }

    /// Read `key` and, if it holds a container, return it observed with this
    /// wrapper's mode.
    ///
    /// Shallow wrappers never expose nested containers reactively.
    pub fn nested(&self, rt: &Runtime, key: impl Into<Key>) -> Result<Option<Observed>> {
        let value = self.get(rt, key)?;
        if self.options.shallow {
            return Ok(None);
        }
        Ok(value
            .as_container()
            .filter(|child| rt.contains(*child))
            .map(|child| Observed::new(child, self.options)))
    }

    /// Whether `key` exists. Tracks the enumeration key.
    pub fn has(&self, rt: &Runtime, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        let (shape, has) = rt.read_container(self.raw, |c| (c.shape(), c.has(&key)))?;
        rt.track(self.target(), shape.enumeration_key());
        Ok(has)
    }

    /// All present keys. Tracks the enumeration key.
    pub fn keys(&self, rt: &Runtime) -> Result<Vec<Key>> {
        let (shape, keys) = rt.read_container(self.raw, |c| (c.shape(), c.own_keys()))?;
        rt.track(self.target(), shape.enumeration_key());
        Ok(keys)
    }

    /// Entry count of a record or length of a sequence.
    pub fn len(&self, rt: &Runtime) -> Result<usize> {
        let (shape, len) = rt.read_container(self.raw, |c| (c.shape(), c.len()))?;
        rt.track(self.target(), shape.enumeration_key());
        Ok(len)
    }

    pub fn is_empty(&self, rt: &Runtime) -> Result<bool> {
        Ok(self.len(rt)? == 0)
    }

    /// Write `value` at `key` and notify subscribers if anything changed.
    ///
    /// The write always reaches the container; only the notification is
    /// skipped when an existing key keeps the same value. Sequences refuse
    /// to grow past `RuntimeConfig::max_sequence_len`.
    pub fn set(&self, rt: &Runtime, key: impl Into<Key>, value: impl Into<Value>) -> Result<WriteOutcome> {
        let key = key.into();
        let value = value.into();
        if self.reject_write(rt, &key) {
            return Ok(WriteOutcome::Rejected);
        }

        let limit = rt.config().max_sequence_len;
        let kind = rt.write_container(self.raw, |c| -> Result<Option<MutationKind>> {
            if c.shape() == Shape::Sequence {
                check_sequence_bounds(limit, &key, &value)?;
            }
            let kind = match (c.shape(), &key) {
                (Shape::Sequence, Key::Index(i)) if *i < c.len() => MutationKind::Set,
                _ if c.has(&key) => MutationKind::Set,
                _ => MutationKind::Add,
            };
            let unchanged = kind == MutationKind::Set
                && c.get(&key).unwrap_or_default().same_value(&value);
            c.set(&key, value.clone())?;
            Ok((!unchanged).then_some(kind))
        })??;

        match kind {
            Some(kind) => {
                rt.trigger(self.target(), &key, kind, &value);
                Ok(WriteOutcome::Applied(kind))
            }
            None => Ok(WriteOutcome::Unchanged),
        }
    }

    /// Remove `key`; notifies only if the key existed.
    pub fn delete(&self, rt: &Runtime, key: impl Into<Key>) -> Result<WriteOutcome> {
        let key = key.into();
        if self.reject_write(rt, &key) {
            return Ok(WriteOutcome::Rejected);
        }

        let removed = rt.write_container(self.raw, |c| c.delete_key(&key))??;
        if removed.is_none() {
            return Ok(WriteOutcome::Unchanged);
        }
        rt.trigger(self.target(), &key, MutationKind::Delete, &Value::Undefined);
        Ok(WriteOutcome::Applied(MutationKind::Delete))
    }

    /// Append to a sequence.
    ///
    /// The length is read untracked, so a computation that pushes does not
    /// subscribe to the length it grows.
    pub fn push(&self, rt: &Runtime, value: impl Into<Value>) -> Result<WriteOutcome> {
        let len = rt.read_container(self.raw, |c| c.len())?;
        self.set(rt, Key::Index(len), value)
    }

    /// Remove and return the last element of a sequence.
    ///
    /// Returns `None` for an empty sequence or a read-only wrapper.
    pub fn pop(&self, rt: &Runtime) -> Result<Option<Value>> {
        if self.reject_write(rt, &Key::Length) {
            return Ok(None);
        }
        let len = rt.read_container(self.raw, |c| c.len())?;
        if len == 0 {
            return Ok(None);
        }
        let last = rt.read_container(self.raw, |c| c.get(&Key::Index(len - 1)))?;
        self.set_len(rt, len - 1)?;
        Ok(Some(last.unwrap_or_default()))
    }

    /// Truncate or extend a sequence.
    pub fn set_len(&self, rt: &Runtime, len: usize) -> Result<WriteOutcome> {
        self.set(rt, Key::Length, len)
    }

    fn reject_write(&self, rt: &Runtime, key: &Key) -> bool {
        if !self.options.readonly {
            return false;
        }
        if rt.config().warn_on_readonly_write {
            warn!(container = ?self.raw, %key, "write rejected: container is observed read-only");
        }
        true
    }
}

/// Keep sequence writes under the configured length limit.
fn check_sequence_bounds(limit: usize, key: &Key, value: &Value) -> Result<()> {
    match key {
        Key::Index(i) if *i >= limit => Err(ReactiveError::UnsupportedKey {
            shape: Shape::Sequence,
            key: key.clone(),
        }),
        Key::Length if value.as_index().map_or(false, |len| len > limit) => {
            Err(ReactiveError::InvalidLength(value.clone()))
        }
        _ => Ok(()),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
