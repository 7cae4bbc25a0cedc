//! Dependency Store
//!
//! The store maps `(target, key)` pairs to the computations that read them,
//! and keeps the reverse edge list per computation so its subscriptions can
//! be dropped in one pass.
//!
//! # Why Both Directions
//!
//! Triggering needs the forward direction: "who reads `state.a`?". Re-running
//! needs the reverse direction: before a computation runs again, every edge
//! from its previous run is removed (`forget`) and rebuilt while the body
//! executes. Without that, a computation that stopped reading a key (e.g.
//! `if flag { a } else { b }`) would still be triggered by it.
//!
//! Subscriber sets are `IndexSet`s: inserting twice is a no-op and iteration
//! follows insertion order, so fan-out order is stable between runs.

use std::collections::HashMap;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::subscriber::{Edge, EffectId, Target};
use crate::value::Key;

type KeyTable = HashMap<Key, IndexSet<EffectId>>;

/// Forward and reverse dependency tables.
#[derive(Debug, Default)]
pub struct DepStore {
    targets: HashMap<Target, KeyTable>,
    edges: HashMap<EffectId, SmallVec<[Edge; 4]>>,
}

impl DepStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `effect` to `(target, key)`.
    ///
    /// Returns `false` if the edge already existed.
    pub fn record(&mut self, target: Target, key: Key, effect: EffectId) -> bool {
        let inserted = self
            .targets
            .entry(target)
            .or_default()
            .entry(key.clone())
            .or_default()
            .insert(effect);

        if inserted {
            self.edges.entry(effect).or_default().push((target, key));
        }
        inserted
    }

    /// Subscribers of `(target, key)`. Never creates entries.
    pub fn lookup(&self, target: Target, key: &Key) -> impl Iterator<Item = EffectId> + '_ {
        self.targets
            .get(&target)
            .and_then(|keys| keys.get(key))
            .into_iter()
            .flat_map(|subs| subs.iter().copied())
    }

    /// Subscribers of every `Key::Index(i)` of `target` with `i >= from`.
    pub fn lookup_indices_from(&self, target: Target, from: usize) -> Vec<EffectId> {
        let Some(keys) = self.targets.get(&target) else {
            return Vec::new();
        };

        let mut indices: Vec<(usize, &IndexSet<EffectId>)> = keys
            .iter()
            .filter_map(|(key, subs)| match key {
                Key::Index(i) if *i >= from => Some((*i, subs)),
                _ => None,
            })
            .collect();
        indices.sort_unstable_by_key(|(i, _)| *i);

        indices
            .into_iter()
            .flat_map(|(_, subs)| subs.iter().copied())
            .collect()
    }

    /// Drop every subscription of `effect`.
    ///
    /// Returns the number of edges removed.
    pub fn forget(&mut self, effect: EffectId) -> usize {
        let Some(edges) = self.edges.remove(&effect) else {
            return 0;
        };

        for (target, key) in &edges {
            let Some(keys) = self.targets.get_mut(target) else {
                continue;
            };
            if let Some(subs) = keys.get_mut(key) {
                subs.shift_remove(&effect);
                if subs.is_empty() {
                    keys.remove(key);
                }
            }
            if keys.is_empty() {
                self.targets.remove(target);
            }
        }

        edges.len()
    }

    /// Remove all subscriptions on `target`, e.g. after the container was
    /// released.
    ///
    /// Edge lists of subscribers may still mention the target; `forget`
    /// skips tables that no longer exist.
    pub fn drop_target(&mut self, target: Target) -> bool {
        self.targets.remove(&target).is_some()
    }

    pub fn dependency_count(&self, effect: EffectId) -> usize {
        self.edges.get(&effect).map_or(0, SmallVec::len)
    }

    pub fn subscriber_count(&self, target: Target, key: &Key) -> usize {
        self.lookup(target, key).count()
    }

    /// Whether any subscription on `target` exists.
    pub fn is_observed(&self, target: Target) -> bool {
        self.targets.contains_key(&target)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
