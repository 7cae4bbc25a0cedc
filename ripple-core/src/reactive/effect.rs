//! Effect Implementation
//!
//! An Effect is a re-runnable computation that runs again whenever something
//! it read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish its
//!    initial dependencies (unless created `lazy`).
//!
//! 2. When any dependency changes, the effect is re-run, or handed to its
//!    scheduler if it has one.
//!
//! 3. Before re-running, the effect forgets all of its old dependencies and
//!    tracks new ones during execution.
//!
//! # Lifecycle
//!
//! `idle → running → idle`, repeated. The body's return value becomes the
//! effect's last result. An effect lives until [`Runtime::dispose`]; after
//! that it is gone from the dependency store and the job queue, and
//! [`Effect::run`] refuses with `Disposed`.
//!
//! # Differences from Computed
//!
//! - Computeds are lazy and cache their value; effects run eagerly.
//! - A computed is itself a reactive target; an effect is only a subscriber.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::runtime::Runtime;
use super::subscriber::{EffectId, Target};
use crate::error::{ReactiveError, Result};
use crate::value::Value;

/// Body of a computation.
pub type EffectFn = Arc<dyn Fn(&Runtime) -> Value + Send + Sync>;

/// Scheduling policy: decides what happens when a computation is triggered.
///
/// Receives the triggered effect instead of running it. See
/// [`queued`](super::queued) for the batching policy.
pub type SchedulerFn = Arc<dyn Fn(&Runtime, Effect) + Send + Sync>;

/// Options accepted by [`Runtime::run`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation; the caller triggers the first run.
    pub lazy: bool,
    /// `None` re-runs synchronously inside the trigger.
    pub scheduler: Option<SchedulerFn>,
}

impl EffectOptions {
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            scheduler: None,
        }
    }

    /// Batch re-runs through the runtime's job queue.
    pub fn queued() -> Self {
        Self::default().with_scheduler(super::queued())
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerFn) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

/// Arena entry of a computation.
pub(crate) struct EffectNode {
    body: EffectFn,
    scheduler: Option<SchedulerFn>,
    runs: usize,
    last: Value,
}

/// Handle to a registered computation.
///
/// Handles are plain identifiers; the computation itself is owned by the
/// runtime and is only destroyed by [`Effect::dispose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Effect {
    id: EffectId,
}

impl Runtime {
    /// Register a computation.
    ///
    /// Unless `options.lazy` is set, `body` runs once before this returns.
    pub fn run<F, R>(&self, body: F, options: EffectOptions) -> Effect
    where
        F: Fn(&Runtime) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        let node = EffectNode {
            body: Arc::new(move |rt: &Runtime| body(rt).into()),
            scheduler: options.scheduler,
            runs: 0,
            last: Value::Undefined,
        };
        let effect = Effect {
            id: self.effects.lock().insert(node),
        };
        debug!(effect = ?effect.id, lazy = options.lazy, "effect registered");

        if !options.lazy {
            // Cannot be disposed before its first run.
            let _ = self.run_effect(effect.id);
        }
        effect
    }

    /// Register an eager, synchronously re-run computation.
    pub fn effect<F, R>(&self, body: F) -> Effect
    where
        F: Fn(&Runtime) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        self.run(body, EffectOptions::default())
    }

    /// Forget the old dependencies of `id` and run its body, tracking new
    /// ones.
    pub(crate) fn run_effect(&self, id: EffectId) -> Result<Value> {
        let body = {
            let effects = self.effects.lock();
            let node = effects.get(id).ok_or(ReactiveError::Disposed(id))?;
            Arc::clone(&node.body)
        };

        let forgotten = self.store.lock().forget(id);
        trace!(effect = ?id, forgotten, "running effect");

        let value = {
            let _frame = self.tracker.enter(id);
            body(self)
        };

        if let Some(node) = self.effects.lock().get_mut(id) {
            node.runs += 1;
            node.last = value.clone();
        }
        Ok(value)
    }

    /// Route a triggered computation to its scheduler, or re-run it.
    pub(crate) fn dispatch(&self, id: EffectId) {
        let scheduler = match self.effects.lock().get(id) {
            Some(node) => node.scheduler.clone(),
            None => return,
        };
        match scheduler {
            Some(scheduler) => scheduler(self, Effect { id }),
            None => {
                if let Err(err) = self.run_effect(id) {
                    debug!(effect = ?id, %err, "skipped re-run");
                }
            }
        }
    }

    /// Destroy a computation.
    ///
    /// Removes it from the dependency store and the job queue; a watcher's
    /// pending invalidation callback runs one last time. Returns `false` if
    /// it was already disposed.
    pub fn dispose(&self, effect: Effect) -> bool {
        let id = effect.id;
        if self.effects.lock().remove(id).is_none() {
            return false;
        }

        {
            let mut store = self.store.lock();
            store.forget(id);
            store.drop_target(Target::Computed(id));
        }
        self.queue.lock().cancel(id);
        self.computeds.lock().remove(id);

        let watcher = self.watchers.lock().remove(id);
        if let Some(cleanup) = watcher.and_then(|mut w| w.take_cleanup()) {
            cleanup();
        }

        debug!(effect = ?id, "effect disposed");
        true
    }
}

impl Effect {
    pub(crate) fn from_id(id: EffectId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Run the body again, returning its result.
    pub fn run(&self, rt: &Runtime) -> Result<Value> {
        rt.run_effect(self.id)
    }

    pub fn dispose(&self, rt: &Runtime) -> bool {
        rt.dispose(*self)
    }

    pub fn is_disposed(&self, rt: &Runtime) -> bool {
        !rt.effects.lock().contains_key(self.id)
    }

    /// Number of completed runs, `0` once disposed.
    pub fn run_count(&self, rt: &Runtime) -> usize {
        rt.effects.lock().get(self.id).map_or(0, |node| node.runs)
    }

    /// Result of the most recent completed run.
    pub fn last_result(&self, rt: &Runtime) -> Option<Value> {
        rt.effects.lock().get(self.id).map(|node| node.last.clone())
    }

    pub fn dependency_count(&self, rt: &Runtime) -> usize {
        rt.store.lock().dependency_count(self.id)
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
    fn effect_runs_on_creation() {
        let rt = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = rt.effect(move |_: &Runtime| {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(&rt), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let rt = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = rt.run(
            move |_: &Runtime| {
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            },
            EffectOptions::lazy(),
        );
        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(&rt), 0);

        effect.run(&rt).unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(&rt), 1);
    }

    #[test]
    fn run_returns_the_body_result() {
        let rt = Runtime::new();
        let state = rt.reactive(Record::from_pairs([("a", 20)]));

        let effect = rt.run(
            move |rt: &Runtime| state.get(rt, "a").unwrap(),
            EffectOptions::lazy(),
        );
        assert_eq!(effect.last_result(&rt), Some(Value::Undefined));
        assert_eq!(effect.run(&rt).unwrap(), Value::from(20));
        assert_eq!(effect.last_result(&rt), Some(Value::from(20)));
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let rt = Runtime::new();
        let state = rt.reactive(Record::from_pairs([("a", 1)]));
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = rt.effect(move |rt: &Runtime| {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
            state.get(rt, "a").unwrap()
        });
        assert_eq!(effect.dependency_count(&rt), 1);

        assert!(effect.dispose(&rt));
        assert!(effect.is_disposed(&rt));
        assert!(!effect.dispose(&rt));
        assert_eq!(effect.dependency_count(&rt), 0);

        state.set(&rt, "a", 2).unwrap();
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert!(matches!(effect.run(&rt), Err(ReactiveError::Disposed(_))));
    }

    #[test]
    fn dependencies_are_rebuilt_each_run() {
        let rt = Runtime::new();
        let state = rt.reactive(Record::from_pairs([("a", 1), ("b", 2), ("c", 3)]));

        let effect = rt.effect(move |rt: &Runtime| {
            state.get(rt, "a").unwrap();
            state.get(rt, "a").unwrap();
            state.get(rt, "b").unwrap();
        });
        assert_eq!(effect.dependency_count(&rt), 2);

        effect.run(&rt).unwrap();
        assert_eq!(effect.dependency_count(&rt), 2);
    }

    #[test]
    fn effect_disposing_itself_stops_tracking() {
        let rt = Runtime::new();
        let state = rt.reactive(Record::from_pairs([("a", 1)]));
        let slot: Arc<parking_lot::Mutex<Option<Effect>>> = Arc::default();
        let slot_clone = slot.clone();

        let effect = rt.run(
            move |rt: &Runtime| {
                if let Some(me) = *slot_clone.lock() {
                    me.dispose(rt);
                }
                state.get(rt, "a").unwrap();
            },
            EffectOptions::lazy(),
        );
        *slot.lock() = Some(effect);

        effect.run(&rt).unwrap();
        assert!(effect.is_disposed(&rt));
        assert_eq!(effect.dependency_count(&rt), 0);
    }
}
