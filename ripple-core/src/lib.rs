//! Ripple Core
//!
//! This crate provides a fine-grained reactive runtime for mutable key-value
//! state. It implements:
//!
//! - Observed containers that record reads and notify on writes
//! - Effects that re-run when anything they read changes
//! - Cached computed values and `(new, old)` watches
//! - A batching job queue flushed by the host
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: dynamically typed values and container keys
//! - `container`: the `Container` trait and its record/sequence adapters
//! - `reactive`: the runtime, dependency store, tracking and scheduling
//! - `json`: building container trees from `serde_json` documents
//! - `config`: runtime settings
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{Record, Runtime, Value};
//!
//! let rt = Runtime::new();
//! let state = rt.reactive(Record::from_pairs([("count", 1)]));
//!
//! // Derived value, computed on first read
//! let doubled = rt.derive(move |rt: &Runtime| {
//!     state.get(rt, "count").unwrap().as_number().unwrap_or_default() * 2.0
//! });
//!
//! // Effect, runs now and after every change it depends on
//! let effect = rt.effect(move |rt: &Runtime| doubled.get(rt).unwrap());
//! assert_eq!(effect.last_result(&rt), Some(Value::from(2)));
//!
//! state.set(&rt, "count", 5).unwrap();
//! assert_eq!(effect.last_result(&rt), Some(Value::from(10)));
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod json;
pub mod reactive;
pub mod value;

pub use config::RuntimeConfig;
pub use container::{Container, Record, Sequence, Shape};
pub use error::{JobFailure, ReactiveError, Result};
pub use reactive::{
    queued, Computed, ComputedState, ContainerId, Effect, EffectId, EffectOptions, Flush,
    Invalidation, MutationKind, ObserveOptions, Observed, Runtime, Target, WatchHandle,
    WatchOptions, WatchSource, WriteOutcome,
};
pub use value::{Key, Value};
