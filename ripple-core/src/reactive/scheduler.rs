//! Job Scheduler
//!
//! Batches re-runs so that many synchronous mutations produce one run per
//! affected computation.
//!
//! # Algorithm
//!
//! 1. A triggered computation with the [`queued`] policy is added to the
//!    pending set, keyed by its id. A second request in the same batch is a
//!    no-op.
//! 2. The first job of a batch fires the host's flush hook (see
//!    [`Runtime::on_flush_requested`]); later jobs of the same batch do not.
//! 3. When the host calls [`Runtime::flush`], the pending set is drained and
//!    every job runs once, seeing the final state. Jobs queued while the
//!    flush runs are drained in further passes, bounded by
//!    `RuntimeConfig::max_flush_passes`. Past the bound, `flush` reports
//!    `FlushLimit` and leaves the remaining jobs queued.
//! 4. Once the set is empty the batch is over and the next job requests a
//!    new flush.
//!
//! The runtime never decides when to flush; the host's event loop does.
//! A panicking job does not stop the rest of its batch.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, error};

use super::effect::{Effect, SchedulerFn};
use super::runtime::Runtime;
use super::subscriber::EffectId;
use crate::error::{JobFailure, ReactiveError, Result};

/// A deferred unit of work.
pub type Job = Arc<dyn Fn(&Runtime) + Send + Sync>;

/// Hook invoked once per batch when the first job is queued.
pub type FlushHook = Arc<dyn Fn() + Send + Sync>;

/// The batching policy: queue a re-run instead of running inline.
pub fn queued() -> SchedulerFn {
    Arc::new(|rt: &Runtime, effect: Effect| {
        rt.queue_rerun(effect);
    })
}

/// Pending jobs of the current batch.
#[derive(Default)]
pub(crate) struct JobQueue {
    pending: IndexMap<EffectId, Job>,
    flush_requested: bool,
    flushing: bool,
    hook: Option<FlushHook>,
}

impl JobQueue {
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Drop a pending job, e.g. because its computation was disposed.
    pub(crate) fn cancel(&mut self, id: EffectId) -> bool {
        self.pending.shift_remove(&id).is_some()
    }
}

impl Runtime {
    /// Add a job for `effect` to the current batch.
    ///
    /// Returns `false` if the effect already has a pending job.
    pub fn queue_job(&self, effect: Effect, job: Job) -> bool {
        let (inserted, hook) = {
            let mut queue = self.queue.lock();
            let inserted = !queue.pending.contains_key(&effect.id());
            if inserted {
                queue.pending.insert(effect.id(), job);
            }
            let hook = if queue.flush_requested {
                None
            } else {
                queue.flush_requested = true;
                queue.hook.clone()
            };
            (inserted, hook)
        };

        if let Some(hook) = hook {
            hook();
        }
        inserted
    }

    /// Queue a plain re-run of `effect`.
    pub fn queue_rerun(&self, effect: Effect) -> bool {
        self.queue_job(
            effect,
            Arc::new(move |rt: &Runtime| {
                if let Err(err) = effect.run(rt) {
                    debug!(effect = ?effect.id(), %err, "skipped queued re-run");
                }
            }),
        )
    }

    /// Install the hook called when a new batch needs flushing.
    pub fn on_flush_requested<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.queue.lock().hook = Some(Arc::new(hook));
    }

    pub fn has_pending_jobs(&self) -> bool {
        self.queue.lock().len() > 0
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run every pending job.
    ///
    /// Returns how many jobs ran. Calling `flush` from inside a job is a
    /// no-op returning `Ok(0)`; the outer flush picks up anything new.
    pub fn flush(&self) -> Result<usize> {
        {
            let mut queue = self.queue.lock();
            if queue.flushing {
                return Ok(0);
            }
            queue.flushing = true;
        }

        let mut ran = 0;
        let mut passes = 0;
        let mut failures = Vec::new();

        loop {
            let batch = std::mem::take(&mut self.queue.lock().pending);
            if batch.is_empty() {
                break;
            }
            if passes == self.config.max_flush_passes {
                // The leftover jobs stay queued; the next `queue_job` starts
                // a new batch and asks the host for another flush.
                let mut queue = self.queue.lock();
                queue.pending = batch;
                queue.flushing = false;
                queue.flush_requested = false;
                error!(passes, pending = queue.pending.len(), "flush limit reached");
                return Err(ReactiveError::FlushLimit { passes });
            }
            passes += 1;
            debug!(pass = passes, jobs = batch.len(), "flushing jobs");

            for (id, job) in batch {
                // Disposed after being queued in an earlier pass.
                if !self.effects.lock().contains_key(id) {
                    continue;
                }
                match catch_unwind(AssertUnwindSafe(|| job(self))) {
                    Ok(()) => ran += 1,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(effect = ?id, %message, "job panicked during flush");
                        failures.push(JobFailure {
                            effect: id,
                            message,
                        });
                    }
                }
            }
        }

        {
            let mut queue = self.queue.lock();
            queue.flushing = false;
            queue.flush_requested = false;
        }

        if failures.is_empty() {
            Ok(ran)
        } else {
            Err(ReactiveError::JobsFailed(failures))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Record;
    use crate::reactive::EffectOptions;
    use crate::value::Value;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn duplicate_requests_collapse() {
        let rt = Runtime::new();
        let effect = rt.run(|_: &Runtime| {}, EffectOptions::lazy());

        assert!(rt.queue_rerun(effect));
        assert!(!rt.queue_rerun(effect));
        assert_eq!(rt.pending_jobs(), 1);

        assert_eq!(rt.flush().unwrap(), 1);
        assert_eq!(effect.run_count(&rt), 1);
        assert!(!rt.has_pending_jobs());
    }

    #[test]
    fn flush_hook_fires_once_per_batch() {
        let rt = Runtime::new();
        let requests = Arc::new(AtomicI32::new(0));
        let requests_clone = requests.clone();
        rt.on_flush_requested(move || {
            requests_clone.fetch_add(1, Ordering::SeqCst);
        });

        let a = rt.run(|_: &Runtime| {}, EffectOptions::lazy());
        let b = rt.run(|_: &Runtime| {}, EffectOptions::lazy());
        rt.queue_rerun(a);
        rt.queue_rerun(b);
        assert_eq!(requests.load(Ordering::SeqCst), 1);

        rt.flush().unwrap();
        rt.queue_rerun(a);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn queued_effect_sees_final_state() {
        let rt = Runtime::new();
        let state = rt.reactive(Record::from_pairs([("a", 1)]));
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _effect = rt.run(
            move |rt: &Runtime| {
                let value = state.get(rt, "a").unwrap();
                seen_clone.lock().push(value);
            },
            EffectOptions::queued(),
        );

        state.set(&rt, "a", 2).unwrap();
        state.set(&rt, "a", 3).unwrap();
        assert_eq!(seen.lock().len(), 1);

        rt.flush().unwrap();
        assert_eq!(*seen.lock(), vec![Value::from(1), Value::from(3)]);
    }

    #[test]
    fn disposed_effects_leave_the_queue() {
        let rt = Runtime::new();
        let effect = rt.run(|_: &Runtime| {}, EffectOptions::lazy());

        rt.queue_rerun(effect);
        effect.dispose(&rt);
        assert_eq!(rt.pending_jobs(), 0);
        assert_eq!(rt.flush().unwrap(), 0);
    }

    #[test]
    fn panicking_job_does_not_abort_the_batch() {
        let rt = Runtime::new();
        let survivor_runs = Arc::new(AtomicI32::new(0));
        let survivor_clone = survivor_runs.clone();

        let failing = rt.run(|_: &Runtime| {}, EffectOptions::lazy());
        let survivor = rt.run(
            move |_: &Runtime| {
                survivor_clone.fetch_add(1, Ordering::SeqCst);
            },
            EffectOptions::lazy(),
        );

        rt.queue_job(failing, Arc::new(|_: &Runtime| panic!("job exploded")));
        rt.queue_rerun(survivor);

        match rt.flush() {
            Err(ReactiveError::JobsFailed(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].effect, failing.id());
                assert_eq!(failures[0].message, "job exploded");
            }
            other => panic!("expected JobsFailed, got {other:?}"),
        }
        assert_eq!(survivor_runs.load(Ordering::SeqCst), 1);
        assert_eq!(rt.active_effect(), None);
    }

    #[test]
    fn self_requeueing_job_hits_the_flush_limit() {
        let rt = Runtime::with_config(crate::config::RuntimeConfig {
            max_flush_passes: 3,
            ..Default::default()
        });
        let effect = rt.run(|_: &Runtime| {}, EffectOptions::lazy());

        fn requeue(rt: &Runtime, effect: Effect) {
            rt.queue_job(effect, Arc::new(move |rt: &Runtime| requeue(rt, effect)));
        }
        requeue(&rt, effect);

        assert!(matches!(
            rt.flush(),
            Err(ReactiveError::FlushLimit { passes: 3 })
        ));
        assert_eq!(rt.pending_jobs(), 1);
    }

    #[test]
    fn flush_limit_lets_the_next_batch_request_a_flush() {
        let rt = Runtime::with_config(crate::config::RuntimeConfig {
            max_flush_passes: 2,
            ..Default::default()
        });
        let requests = Arc::new(AtomicI32::new(0));
        let requests_clone = requests.clone();
        rt.on_flush_requested(move || {
            requests_clone.fetch_add(1, Ordering::SeqCst);
        });

        let runaway = rt.run(|_: &Runtime| {}, EffectOptions::lazy());
        fn requeue(rt: &Runtime, effect: Effect) {
            rt.queue_job(effect, Arc::new(move |rt: &Runtime| requeue(rt, effect)));
        }
        requeue(&rt, runaway);
        assert!(matches!(rt.flush(), Err(ReactiveError::FlushLimit { passes: 2 })));
        assert_eq!(requests.load(Ordering::SeqCst), 1);

        runaway.dispose(&rt);
        assert_eq!(rt.pending_jobs(), 0);

        let fresh = rt.run(|_: &Runtime| {}, EffectOptions::lazy());
        rt.queue_rerun(fresh);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
        assert_eq!(rt.flush().unwrap(), 1);
        assert_eq!(fresh.run_count(&rt), 1);
    }
}
