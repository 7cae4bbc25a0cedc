//! Reactive Primitives
//!
//! This module implements the core reactive system: observed containers,
//! effects, computeds and watches. Everything hangs off a [`Runtime`].
//!
//! # Concepts
//!
//! ## Observed Containers
//!
//! An [`Observed`] wraps a raw container. When a key is read through it while
//! a computation is running, the runtime records that the computation depends
//! on `(container, key)`. When a key is written through it, every dependent
//! computation is re-run or scheduled.
//!
//! ## Effects
//!
//! An [`Effect`] is a re-runnable computation. It forgets its dependencies
//! before every run and rebuilds them from what it reads, so a branch that is
//! no longer taken stops triggering it.
//!
//! ## Computeds
//!
//! A [`Computed`] is a derived value that caches its result. It re-evaluates
//! only when read after one of its dependencies changed.
//!
//! ## Watches
//!
//! A watch calls a callback with `(new, old)` whenever its source changes,
//! either inline or on the next [`Runtime::flush`].
//!
//! # Implementation Notes
//!
//! Tracking uses a stack of frames owned by the runtime rather than a
//! global. Bodies receive `&Runtime`, and every read they make through an
//! `Observed` is attributed to the frame on top of the stack.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod effect;
mod observed;
mod runtime;
mod scheduler;
mod store;
mod subscriber;
mod watch;

pub use computed::{Computed, ComputedState};
pub use context::{Tracker, TrackingGuard};
pub use effect::{Effect, EffectFn, EffectOptions, SchedulerFn};
pub use observed::{MutationKind, ObserveOptions, Observed, WriteOutcome};
pub use runtime::Runtime;
pub use scheduler::{queued, FlushHook, Job};
pub use store::DepStore;
pub use subscriber::{ContainerId, Edge, EffectId, Target};
pub use watch::{
    Flush, Getter, Invalidation, WatchCallback, WatchHandle, WatchOptions, WatchSource,
};
