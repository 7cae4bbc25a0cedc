//! Identifier types for the reactive system.
//!
//! Containers and computations live in arenas owned by the
//! [`Runtime`](super::Runtime) and are addressed by generational handles.
//! A stale handle (released container, disposed computation) never aliases a
//! newer entry that happens to reuse the slot.

use slotmap::new_key_type;

use crate::value::Key;

new_key_type! {
    /// Handle of a raw container stored in the runtime arena.
    pub struct ContainerId;

    /// Handle of a computation (effect, computed or watcher).
    ///
    /// Computations are the subscribers of the dependency store.
    pub struct EffectId;
}

/// Something that can be read reactively.
///
/// Dependencies are keyed by `(Target, Key)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Container(ContainerId),
    /// The cached output of a computed value.
    Computed(EffectId),
}

/// One recorded dependency of a computation.
pub type Edge = (Target, Key);
