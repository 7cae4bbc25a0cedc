//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects containers,
//! computations and the scheduler. It owns every piece of mutable state of
//! the reactive system; there is no global.
//!
//! # How It Works
//!
//! 1. Containers are inserted into an arena and addressed by `ContainerId`.
//!
//! 2. When a computation reads through an [`Observed`](super::Observed)
//!    wrapper, the runtime records a `(target, key) → computation` edge.
//!
//! 3. When a wrapper writes, the runtime:
//!    a. Looks up the subscribers of the written key
//!    b. Adds tail-index readers when a sequence shrinks
//!    c. Adds enumeration readers when a key was added or deleted
//!    d. Dispatches each subscriber once, through its scheduler if it has one
//!
//! Bodies, getters, callbacks and schedulers all receive `&Runtime`, which
//! is how nested reads and writes find their way back here.
//!
//! # Thread Safety
//!
//! The runtime is `Send + Sync`; internal tables sit behind `parking_lot`
//! locks that are never held while user code runs. Tracking is still a
//! single logical thread of control: two threads running computations on the
//! same runtime at once would interleave their frames on one stack.

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use slotmap::{SecondaryMap, SlotMap};
use tracing::{debug, trace};

use super::computed::ComputedState;
use super::context::Tracker;
use super::effect::EffectNode;
use super::observed::MutationKind;
use super::scheduler::JobQueue;
use super::store::DepStore;
use super::subscriber::{ContainerId, EffectId, Target};
use super::watch::Watcher;
use crate::config::RuntimeConfig;
use crate::container::{Container, Shape};
use crate::error::{ReactiveError, Result};
use crate::value::{Key, Value};

/// Owner of all reactive state.
pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) containers: RwLock<SlotMap<ContainerId, Box<dyn Container>>>,
    pub(crate) store: Mutex<DepStore>,
    pub(crate) tracker: Tracker,
    pub(crate) effects: Mutex<SlotMap<EffectId, EffectNode>>,
    pub(crate) queue: Mutex<JobQueue>,
    pub(crate) computeds: Mutex<SecondaryMap<EffectId, ComputedState>>,
    pub(crate) watchers: Mutex<SecondaryMap<EffectId, Watcher>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            containers: RwLock::new(SlotMap::with_key()),
            store: Mutex::new(DepStore::new()),
            tracker: Tracker::new(),
            effects: Mutex::new(SlotMap::with_key()),
            queue: Mutex::new(JobQueue::default()),
            computeds: Mutex::new(SecondaryMap::new()),
            watchers: Mutex::new(SecondaryMap::new()),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Move a raw container into the arena.
    pub fn insert<C: Container + 'static>(&self, container: C) -> ContainerId {
        self.insert_boxed(Box::new(container))
    }

    pub fn insert_boxed(&self, container: Box<dyn Container>) -> ContainerId {
        let id = self.containers.write().insert(container);
        trace!(container = ?id, "container inserted");
        id
    }

    /// Remove a container from the arena and drop its subscriptions.
    ///
    /// Handles to it (and `Value::Container` references held by other
    /// containers) become stale; operations on them report
    /// `ReleasedContainer`.
    pub fn release(&self, id: ContainerId) -> Result<Box<dyn Container>> {
        let container = self
            .containers
            .write()
            .remove(id)
            .ok_or(ReactiveError::ReleasedContainer(id))?;
        self.store.lock().drop_target(Target::Container(id));
        debug!(container = ?id, "container released");
        Ok(container)
    }

    pub fn contains(&self, id: ContainerId) -> bool {
        self.containers.read().contains_key(id)
    }

    pub fn shape(&self, id: ContainerId) -> Result<Shape> {
        self.read_container(id, |c| c.shape())
    }

    /// Run `f` against the raw container without tracking anything.
    ///
    /// `f` runs under the arena lock and must not call back into the
    /// runtime.
    pub(crate) fn read_container<T>(&self, id: ContainerId, f: impl FnOnce(&dyn Container) -> T) -> Result<T> {
        let containers = self.containers.read();
        let container = containers
            .get(id)
            .ok_or(ReactiveError::ReleasedContainer(id))?;
        Ok(f(container.as_ref()))
    }

    pub(crate) fn write_container<T>(
        &self,
        id: ContainerId,
        f: impl FnOnce(&mut dyn Container) -> T,
    ) -> Result<T> {
        let mut containers = self.containers.write();
        let container = containers
            .get_mut(id)
            .ok_or(ReactiveError::ReleasedContainer(id))?;
        Ok(f(container.as_mut()))
    }

    /// How many computations currently depend on `(target, key)`.
    pub fn subscriber_count(&self, target: Target, key: &Key) -> usize {
        self.store.lock().subscriber_count(target, key)
    }

    /// The computation reads are currently attributed to.
    pub fn active_effect(&self) -> Option<EffectId> {
        self.tracker.tracking()
    }

    /// Run `f` with dependency tracking suspended.
    pub fn untracked<T>(&self, f: impl FnOnce(&Runtime) -> T) -> T {
        let _paused = self.tracker.pause();
        f(self)
    }

    /// Subscribe the active computation to `(target, key)`.
    ///
    /// No-op outside a computation or inside an untracked section.
    pub fn track(&self, target: Target, key: Key) {
        let Some(effect) = self.tracker.tracking() else {
            return;
        };
        // A computation disposed from inside its own body must not pick up
        // new edges on its way out.
        if !self.effects.lock().contains_key(effect) {
            return;
        }
        if self.store.lock().record(target, key.clone(), effect) {
            trace!(?target, %key, ?effect, "dependency recorded");
        }
    }

    /// Re-run (or schedule) every computation affected by a mutation.
    ///
    /// Returns the number of computations dispatched.
    pub fn trigger(&self, target: Target, key: &Key, kind: MutationKind, new_value: &Value) -> usize {
        let shape = match target {
            Target::Container(id) => self.shape(id).ok(),
            Target::Computed(_) => None,
        };
        let running = self.tracker.running();

        let mut to_run: IndexSet<EffectId> = IndexSet::new();
        {
            let store = self.store.lock();
            to_run.extend(store.lookup(target, key));

            if *key == Key::Length && shape == Some(Shape::Sequence) {
                if let Some(len) = new_value.as_index() {
                    to_run.extend(store.lookup_indices_from(target, len));
                }
            }

            if matches!(kind, MutationKind::Add | MutationKind::Delete) {
                let enumeration = shape.map_or(Key::Iterate, Shape::enumeration_key);
                to_run.extend(store.lookup(target, &enumeration));
            }
        }
        if let Some(running) = running {
            to_run.shift_remove(&running);
        }

        if to_run.is_empty() {
            return 0;
        }
        debug!(?target, %key, ?kind, subscribers = to_run.len(), "trigger");

        let count = to_run.len();
        for effect in to_run {
            self.dispatch(effect);
        }
        count
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("containers", &self.containers.read().len())
            .field("effects", &self.effects.lock().len())
            .field("pending_jobs", &self.queue.lock().len())
            .field("tracking_depth", &self.tracker.depth())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
