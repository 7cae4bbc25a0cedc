//! Error types shared by the whole crate.

use thiserror::Error;

use crate::container::Shape;
use crate::reactive::{ContainerId, EffectId};
use crate::value::{Key, Value};

/// Convenience alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors raised by the reactive runtime.
///
/// Writing through a read-only wrapper is not an error: it is reported as
/// [`WriteOutcome::Rejected`](crate::reactive::WriteOutcome::Rejected).
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// The computation was disposed and refuses to run.
    #[error("computation {0:?} has been disposed")]
    Disposed(EffectId),

    #[error("container {0:?} has been released")]
    ReleasedContainer(ContainerId),

    #[error("key `{key}` is not supported by a {shape} container")]
    UnsupportedKey { shape: Shape, key: Key },

    #[error("invalid sequence length: {0}")]
    InvalidLength(Value),

    /// Jobs kept queueing more jobs while the queue was being flushed.
    #[error("flush stopped after {passes} passes with jobs still queued")]
    FlushLimit { passes: usize },

    #[error("{} queued job(s) panicked during flush", .0.len())]
    JobsFailed(Vec<JobFailure>),

    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// A queued job that panicked while the queue was flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub effect: EffectId,
    pub message: String,
}
