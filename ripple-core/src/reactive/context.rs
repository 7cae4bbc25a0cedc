//! Tracking Context
//!
//! The tracking context records which computation is currently running, so
//! that reads can be attributed to it.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one stack of frames. Running a
//! computation pushes an `Active` frame; reads performed while it is on top
//! subscribe that computation. When the computation completes, its frame is
//! popped and attribution returns to whatever was running before (possibly
//! nothing).
//!
//! Frames are popped by a guard's `Drop`, so the stack stays balanced even
//! if the computation panics.
//!
//! An `untracked` section pushes a `Paused` frame: reads inside it record
//! nothing, although the computation underneath is still considered running.

use parking_lot::Mutex;

use super::subscriber::EffectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Active(EffectId),
    Paused,
}

/// Stack of running computations.
#[derive(Debug, Default)]
pub struct Tracker {
    stack: Mutex<Vec<Frame>>,
}

/// Guard that pops its frame when dropped.
pub struct TrackingGuard<'a> {
    tracker: &'a Tracker,
    frame: Frame,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `effect` the computation that reads are attributed to.
    pub fn enter(&self, effect: EffectId) -> TrackingGuard<'_> {
        self.push(Frame::Active(effect))
    }

    /// Suspend attribution until the guard is dropped.
    pub fn pause(&self) -> TrackingGuard<'_> {
        self.push(Frame::Paused)
    }

    fn push(&self, frame: Frame) -> TrackingGuard<'_> {
        self.stack.lock().push(frame);
        TrackingGuard {
            tracker: self,
            frame,
        }
    }

    /// The computation that a read right now would subscribe, if any.
    pub fn tracking(&self) -> Option<EffectId> {
        match self.stack.lock().last() {
            Some(Frame::Active(effect)) => Some(*effect),
            _ => None,
        }
    }

    /// The innermost running computation, looking through paused frames.
    ///
    /// Used to suppress a computation re-triggering itself.
    pub fn running(&self) -> Option<EffectId> {
        self.stack.lock().iter().rev().find_map(|frame| match frame {
            Frame::Active(effect) => Some(*effect),
            Frame::Paused => None,
        })
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        let popped = self.tracker.stack.lock().pop();
        debug_assert_eq!(
            popped,
            Some(self.frame),
            "tracking stack mismatch: expected {:?}, got {:?}",
            self.frame,
            popped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn two_ids() -> (EffectId, EffectId) {
        let mut arena: SlotMap<EffectId, ()> = SlotMap::with_key();
        (arena.insert(()), arena.insert(()))
    }

    #[test]
    fn guard_restores_previous_frame() {
        let tracker = Tracker::new();
        let (outer, inner) = two_ids();

        assert_eq!(tracker.tracking(), None);
        {
            let _outer = tracker.enter(outer);
            assert_eq!(tracker.tracking(), Some(outer));
            {
                let _inner = tracker.enter(inner);
                assert_eq!(tracker.tracking(), Some(inner));
            }
            assert_eq!(tracker.tracking(), Some(outer));
        }
        assert_eq!(tracker.tracking(), None);
        assert_eq!(tracker.depth(), 0);
    }

    #[test]
    fn paused_frame_hides_tracking_but_not_running() {
        let tracker = Tracker::new();
        let (effect, _) = two_ids();

        let _active = tracker.enter(effect);
        let paused = tracker.pause();
        assert_eq!(tracker.tracking(), None);
        assert_eq!(tracker.running(), Some(effect));
        drop(paused);
        assert_eq!(tracker.tracking(), Some(effect));
    }

    #[test]
    fn stack_unwinds_on_panic() {
        let tracker = Tracker::new();
        let (effect, _) = two_ids();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = tracker.enter(effect);
            panic!("body failed");
        }));

        assert!(result.is_err());
        assert_eq!(tracker.depth(), 0);
        assert_eq!(tracker.tracking(), None);
    }
}
