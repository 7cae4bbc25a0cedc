//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! its dependencies changed *and* someone reads it.
//!
//! # How Computeds Work
//!
//! 1. A computed is a lazy computation whose scheduler does not re-run it.
//!    Instead, when a dependency changes, the scheduler flips the state to
//!    `Dirty` and notifies whoever read the computed.
//!
//! 2. Reading a `Clean` computed returns the cached value without running
//!    the getter.
//!
//! 3. Reading a `Dirty` computed runs the getter, caches the result and
//!    flips back to `Clean`.
//!
//! 4. Every read subscribes the reader to `(Target::Computed(id), Key::Value)`,
//!    so chains (computed → computed → effect) invalidate correctly.
//!
//! # Why This Matters
//!
//! - A dependency changes
//! - 10 computeds depend on it
//! - Only the computeds that are actually read will recompute
//! - Computeds that are never read stay dirty (no wasted work)

use std::sync::Arc;

use tracing::trace;

use super::effect::{Effect, EffectOptions};
use super::observed::MutationKind;
use super::runtime::Runtime;
use super::subscriber::{EffectId, Target};
use crate::error::{ReactiveError, Result};
use crate::value::{Key, Value};

/// Cache state of a computed value.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputedState {
    /// Needs to run before the next read.
    Dirty,
    /// Up to date.
    Clean(Value),
}

/// A cached derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Computed {
    effect: Effect,
}

impl Runtime {
    /// Create a computed value from `getter`.
    ///
    /// The getter does not run until the first read.
    pub fn derive<F, R>(&self, getter: F) -> Computed
    where
        F: Fn(&Runtime) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        let options = EffectOptions::lazy().with_scheduler(Arc::new(|rt: &Runtime, effect: Effect| {
            rt.invalidate_computed(effect.id());
        }));
        let effect = self.run(getter, options);
        self.computeds.lock().insert(effect.id(), ComputedState::Dirty);
        Computed { effect }
    }

    /// Mark a computed dirty and notify its readers.
    ///
    /// Readers are only notified on the `Clean → Dirty` edge; a computed
    /// that is already dirty has not been read since it last notified.
    fn invalidate_computed(&self, id: EffectId) {
        let was_clean = {
            let mut states = self.computeds.lock();
            match states.get_mut(id) {
                Some(state) if matches!(state, ComputedState::Clean(_)) => {
                    *state = ComputedState::Dirty;
                    true
                }
                _ => false,
            }
        };
        if was_clean {
            trace!(computed = ?id, "computed invalidated");
            self.trigger(Target::Computed(id), &Key::Value, MutationKind::Set, &Value::Undefined);
        }
    }
}

impl Computed {
    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn id(&self) -> EffectId {
        self.effect.id()
    }

    /// Current value, recomputing only if dirty.
    pub fn get(&self, rt: &Runtime) -> Result<Value> {
        let id = self.id();
        let cached = match rt.computeds.lock().get(id) {
            Some(ComputedState::Clean(value)) => Some(value.clone()),
            Some(ComputedState::Dirty) => None,
            None => return Err(ReactiveError::Disposed(id)),
        };

        let value = match cached {
            Some(value) => value,
            None => {
                let value = rt.run_effect(id)?;
                if let Some(state) = rt.computeds.lock().get_mut(id) {
                    *state = ComputedState::Clean(value.clone());
                }
                value
            }
        };

        rt.track(Target::Computed(id), Key::Value);
        Ok(value)
    }

    /// `None` once disposed.
    pub fn state(&self, rt: &Runtime) -> Option<ComputedState> {
        rt.computeds.lock().get(self.id()).cloned()
    }

    pub fn is_dirty(&self, rt: &Runtime) -> bool {
        matches!(self.state(rt), Some(ComputedState::Dirty))
    }

    pub fn dispose(&self, rt: &Runtime) -> bool {
        rt.dispose(self.effect)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Record;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn computed_computes_on_first_access() {
        let rt = Runtime::new();
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = rt.derive(move |_: &Runtime| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert!(computed.is_dirty(&rt));
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        assert_eq!(computed.get(&rt).unwrap(), Value::from(42));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(computed.state(&rt), Some(ComputedState::Clean(Value::from(42))));
    }

    #[test]
    fn computed_caches_value_when_clean() {
        let rt = Runtime::new();
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = rt.derive(move |_: &Runtime| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            "cached"
        });

        let first = computed.get(&rt).unwrap();
        let second = computed.get(&rt).unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        // Same allocation, not just equal text.
        match (first, second) {
            (Value::Text(a), Value::Text(b)) => assert!(Arc::ptr_eq(&a, &b)),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn dependency_change_only_marks_dirty() {
        let rt = Runtime::new();
        let state = rt.reactive(Record::from_pairs([("a", 1)]));
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let doubled = rt.derive(move |rt: &Runtime| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            state.get(rt, "a").unwrap().as_number().unwrap_or_default() * 2.0
        });
        assert_eq!(doubled.get(&rt).unwrap(), Value::from(2));

        state.set(&rt, "a", 5).unwrap();
        assert!(doubled.is_dirty(&rt));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        assert_eq!(doubled.get(&rt).unwrap(), Value::from(10));
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn computed_depends_on_computed() {
        let rt = Runtime::new();
        let state = rt.reactive(Record::from_pairs([("base", 5)]));

        let doubled = rt.derive(move |rt: &Runtime| {
            state.get(rt, "base").unwrap().as_number().unwrap_or_default() * 2.0
        });
        let plus_ten = rt.derive(move |rt: &Runtime| {
            doubled.get(rt).unwrap().as_number().unwrap_or_default() + 10.0
        });

        assert_eq!(plus_ten.get(&rt).unwrap(), Value::from(20));

        state.set(&rt, "base", 10).unwrap();
        assert!(doubled.is_dirty(&rt));
        assert!(plus_ten.is_dirty(&rt));
        assert_eq!(plus_ten.get(&rt).unwrap(), Value::from(30));
    }

    #[test]
    fn disposed_computed_refuses_reads() {
        let rt = Runtime::new();
        let computed = rt.derive(|_: &Runtime| 1);
        assert!(computed.dispose(&rt));
        assert!(computed.state(&rt).is_none());
        assert!(matches!(computed.get(&rt), Err(ReactiveError::Disposed(_))));
    }
}
