//! Watch Implementation
//!
//! A watch pairs a source with a callback that receives `(new, old)` every
//! time the source changes.
//!
//! # How Watches Work
//!
//! 1. The source becomes the body of a lazy computation. A getter source is
//!    used as is; an observed container is traversed deeply so every
//!    reachable key is tracked.
//!
//! 2. On the first run the result only seeds `old`, unless the watch is
//!    `immediate`, in which case the callback fires with `old = Undefined`.
//!
//! 3. When the source changes, the watch job:
//!    a. Calls the invalidation callback registered by the previous round
//!    b. Re-runs the getter
//!    c. Calls the callback with `(new, old)`
//!    d. Stores `new` as `old` for the next round
//!
//! 4. [`Flush::Sync`] runs the job inside the trigger; [`Flush::Post`] puts it
//!    on the job queue so it runs once per flush.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::computed::Computed;
use super::effect::{Effect, EffectOptions};
use super::observed::Observed;
use super::runtime::Runtime;
use super::subscriber::{ContainerId, EffectId};
use crate::error::{ReactiveError, Result};
use crate::value::Value;

/// When a triggered watch job runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flush {
    /// Inline, from inside the trigger.
    #[default]
    Sync,
    /// On the next [`Runtime::flush`].
    Post,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Fire the callback once at registration.
    pub immediate: bool,
    pub flush: Flush,
}

impl WatchOptions {
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }

    pub fn post() -> Self {
        Self {
            flush: Flush::Post,
            ..Self::default()
        }
    }
}

pub type Getter = Arc<dyn Fn(&Runtime) -> Value + Send + Sync>;

/// What a watch observes.
#[derive(Clone)]
pub enum WatchSource {
    Getter(Getter),
    /// Every key reachable from the container.
    Deep(Observed),
}

impl WatchSource {
    pub fn getter<F, R>(getter: F) -> Self
    where
        F: Fn(&Runtime) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        WatchSource::Getter(Arc::new(move |rt: &Runtime| getter(rt).into()))
    }
}

impl From<Observed> for WatchSource {
    fn from(observed: Observed) -> Self {
        WatchSource::Deep(observed)
    }
}

impl From<Computed> for WatchSource {
    fn from(computed: Computed) -> Self {
        WatchSource::getter(move |rt: &Runtime| computed.get(rt).unwrap_or_default())
    }
}

impl fmt::Debug for WatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSource::Getter(_) => f.write_str("Getter(..)"),
            WatchSource::Deep(observed) => f.debug_tuple("Deep").field(observed).finish(),
        }
    }
}

pub type WatchCallback = Arc<dyn Fn(&Runtime, &Value, &Value, &mut Invalidation) + Send + Sync>;

type Cleanup = Box<dyn FnOnce() + Send>;

/// Registrar handed to a watch callback.
///
/// The registered closure runs right before the next round of the same
/// watch, or when the watch is stopped. Registering twice keeps only the
/// latest closure.
#[derive(Default)]
pub struct Invalidation {
    cleanup: Option<Cleanup>,
}

impl Invalidation {
    pub fn on_invalidate<F>(&mut self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanup = Some(Box::new(cleanup));
    }
}

impl fmt::Debug for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidation")
            .field("registered", &self.cleanup.is_some())
            .finish()
    }
}

/// Runtime-side state of a watch.
pub(crate) struct Watcher {
    callback: WatchCallback,
    old: Value,
    cleanup: Option<Cleanup>,
}

impl Watcher {
    pub(crate) fn take_cleanup(&mut self) -> Option<Cleanup> {
        self.cleanup.take()
    }
}

/// Handle returned by [`Runtime::watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle {
    effect: Effect,
}

impl WatchHandle {
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Stop watching. A pending invalidation callback runs now.
    pub fn stop(&self, rt: &Runtime) -> bool {
        rt.dispose(self.effect)
    }
}

impl Runtime {
    /// Call `callback` whenever `source` changes.
    pub fn watch<S, C>(&self, source: S, callback: C, options: WatchOptions) -> WatchHandle
    where
        S: Into<WatchSource>,
        C: Fn(&Runtime, &Value, &Value, &mut Invalidation) + Send + Sync + 'static,
    {
        let getter: Getter = match source.into() {
            WatchSource::Getter(getter) => getter,
            WatchSource::Deep(observed) => Arc::new(move |rt: &Runtime| {
                rt.traverse(observed);
                Value::Container(observed.raw())
            }),
        };

        let flush = options.flush;
        let scheduler = Arc::new(move |rt: &Runtime, effect: Effect| match flush {
            Flush::Sync => rt.run_watch_job_logged(effect.id()),
            Flush::Post => {
                rt.queue_job(
                    effect,
                    Arc::new(move |rt: &Runtime| rt.run_watch_job_logged(effect.id())),
                );
            }
        });

        let effect = self.run(
            move |rt: &Runtime| getter(rt),
            EffectOptions::lazy().with_scheduler(scheduler),
        );
        self.watchers.lock().insert(
            effect.id(),
            Watcher {
                callback: Arc::new(callback),
                old: Value::Undefined,
                cleanup: None,
            },
        );
        debug!(watch = ?effect.id(), ?options, "watch registered");

        if options.immediate {
            self.run_watch_job_logged(effect.id());
        } else if let Ok(initial) = self.run_effect(effect.id()) {
            if let Some(watcher) = self.watchers.lock().get_mut(effect.id()) {
                watcher.old = initial;
            }
        }
        WatchHandle { effect }
    }

    /// Read every key reachable from `observed`, so the running computation
    /// depends on all of them.
    ///
    /// Containers already visited are skipped, which makes cyclic graphs
    /// safe. A shallow wrapper only tracks its own keys.
    pub fn traverse(&self, observed: Observed) {
        let mut seen = HashSet::new();
        self.traverse_inner(observed, &mut seen);
    }

    fn traverse_inner(&self, observed: Observed, seen: &mut HashSet<ContainerId>) {
        if !seen.insert(observed.raw()) {
            return;
        }
        let Ok(keys) = observed.keys(self) else {
            return;
        };
        for key in keys {
            let Ok(value) = observed.get(self, key) else {
                continue;
            };
            if observed.is_shallow() {
                continue;
            }
            if let Some(child) = value.as_container().filter(|id| self.contains(*id)) {
                self.traverse_inner(Observed::new(child, observed.options()), seen);
            }
        }
    }

    fn run_watch_job_logged(&self, id: EffectId) {
        if let Err(err) = self.run_watch_job(id) {
            debug!(watch = ?id, %err, "skipped watch job");
        }
    }

    fn run_watch_job(&self, id: EffectId) -> Result<()> {
        let stale = self
            .watchers
            .lock()
            .get_mut(id)
            .ok_or(ReactiveError::Disposed(id))?
            .take_cleanup();
        if let Some(cleanup) = stale {
            cleanup();
        }

        let new = self.run_effect(id)?;
        let (callback, old) = {
            let watchers = self.watchers.lock();
            let watcher = watchers.get(id).ok_or(ReactiveError::Disposed(id))?;
            (Arc::clone(&watcher.callback), watcher.old.clone())
        };

        let mut invalidation = Invalidation::default();
        callback(self, &new, &old, &mut invalidation);
        trace!(watch = ?id, %new, %old, "watch callback ran");

        let orphan = match self.watchers.lock().get_mut(id) {
            Some(watcher) => {
                watcher.old = new;
                watcher.cleanup = invalidation.cleanup;
                None
            }
            // Stopped from inside its own callback.
            None => invalidation.cleanup,
        };
        if let Some(cleanup) = orphan {
            cleanup();
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
