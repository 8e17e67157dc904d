//! Per-tick change tracking for shadow reconciliation.
//!
//! A [`ChangeSet`] records which entity indices were added, changed, or
//! deleted during one tick, plus one changed-set per synchronized component
//! type so copying can be scoped to the types that actually mutated. The
//! shadow merges the fresh set with the published shadow's set to catch up
//! on the tick its own store missed.

use fixedbitset::FixedBitSet;

use crate::components::SyncedKind;

/// The added / changed / deleted record for one tick of one store.
///
/// Bits are keyed by entity *index* (not handle): the shadow mirrors live
/// indices, so an index names the same entity on both sides of a tick.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    /// Entities created this tick.
    pub added: FixedBitSet,
    /// Entities with at least one synchronized component mutated this tick.
    pub changed: FixedBitSet,
    /// Entities destroyed this tick.
    pub deleted: FixedBitSet,
    /// Per synchronized type: which entities had that type mutated.
    pub changed_components: [FixedBitSet; SyncedKind::COUNT],
    /// The uuid table mutated this tick (full-copied, not diffed).
    pub uuids_changed: bool,
}

impl Default for ChangeSet {
    fn default() -> Self {
        Self {
            added: FixedBitSet::new(),
            changed: FixedBitSet::new(),
            deleted: FixedBitSet::new(),
            changed_components: std::array::from_fn(|_| FixedBitSet::new()),
            uuids_changed: false,
        }
    }
}

fn mark(bits: &mut FixedBitSet, index: u32) {
    let index = index as usize;
    if index >= bits.len() {
        bits.grow(index + 1);
    }
    bits.insert(index);
}

impl ChangeSet {
    /// Create an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entity created this tick.
    pub fn mark_added(&mut self, index: u32) {
        mark(&mut self.added, index);
    }

    /// Record a synchronized component mutation on an entity.
    pub fn mark_changed(&mut self, index: u32, kind: SyncedKind) {
        mark(&mut self.changed, index);
        mark(&mut self.changed_components[kind.index()], index);
        if matches!(kind, SyncedKind::Uuid) {
            self.uuids_changed = true;
        }
    }

    /// Record an entity destroyed this tick.
    pub fn mark_deleted(&mut self, index: u32) {
        mark(&mut self.deleted, index);
    }

    /// Grow every set to at least `bits` entries so set operations line up.
    pub fn grow(&mut self, bits: usize) {
        self.added.grow(bits);
        self.changed.grow(bits);
        self.deleted.grow(bits);
        for set in &mut self.changed_components {
            set.grow(bits);
        }
    }

    /// Largest universe size across all sets.
    #[must_use]
    pub fn universe(&self) -> usize {
        self.changed_components
            .iter()
            .map(FixedBitSet::len)
            .chain([self.added.len(), self.changed.len(), self.deleted.len()])
            .max()
            .unwrap_or(0)
    }

    /// Apply the intra-tick cancellation rules.
    ///
    /// An entity both added and deleted this tick had zero observable
    /// lifetime: it is cancelled out of every set. A freshly-created entity
    /// is synchronized via the add path only, so `changed` drops anything
    /// also in `added`.
    pub fn normalize(&mut self) {
        self.grow(self.universe());

        let mut ghosts = self.added.clone();
        ghosts.intersect_with(&self.deleted);
        if ghosts.count_ones(..) > 0 {
            self.added.difference_with(&ghosts);
            self.changed.difference_with(&ghosts);
            self.deleted.difference_with(&ghosts);
            for set in &mut self.changed_components {
                set.difference_with(&ghosts);
            }
        }

        self.changed.difference_with(&self.added);

        debug_assert!({
            let mut overlap = self.added.clone();
            overlap.intersect_with(&self.deleted);
            overlap.count_ones(..) == 0
        });
        debug_assert!({
            let mut overlap = self.changed.clone();
            overlap.intersect_with(&self.added);
            overlap.count_ones(..) == 0
        });
    }

    /// Forget everything recorded this tick.
    pub fn clear(&mut self) {
        self.added.clear();
        self.changed.clear();
        self.deleted.clear();
        for set in &mut self.changed_components {
            set.clear();
        }
        self.uuids_changed = false;
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.uuids_changed
            && self.added.count_ones(..) == 0
            && self.changed.count_ones(..) == 0
            && self.deleted.count_ones(..) == 0
    }

    /// Counts of (added, changed, deleted) entities.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.added.count_ones(..),
            self.changed.count_ones(..),
            self.deleted.count_ones(..),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_added_and_deleted_same_tick_cancels() {
        let mut changes = ChangeSet::new();
        changes.mark_added(3);
        changes.mark_changed(3, SyncedKind::Movement);
        changes.mark_deleted(3);
        changes.normalize();
        assert!(changes.added.count_ones(..) == 0);
        assert!(changes.changed.count_ones(..) == 0);
        assert!(changes.deleted.count_ones(..) == 0);
        assert_eq!(
            changes.changed_components[SyncedKind::Movement.index()].count_ones(..),
            0
        );
    }

    #[test]
    fn test_changed_never_overlaps_added() {
        let mut changes = ChangeSet::new();
        changes.mark_added(1);
        changes.mark_changed(1, SyncedKind::Name);
        changes.mark_changed(2, SyncedKind::Name);
        changes.normalize();
        assert!(!changes.changed.contains(1));
        assert!(changes.changed.contains(2));
        assert!(changes.added.contains(1));
    }

    #[test]
    fn test_deleted_survives_when_not_added_same_tick() {
        let mut changes = ChangeSet::new();
        changes.mark_changed(5, SyncedKind::Thrust);
        changes.mark_deleted(5);
        changes.normalize();
        // Changed-then-destroyed is surfaced via the delete path only at
        // reconcile time; the raw set keeps both records.
        assert!(changes.deleted.contains(5));
    }

    #[test]
    fn test_uuid_change_raises_flag() {
        let mut changes = ChangeSet::new();
        assert!(changes.is_empty());
        changes.mark_changed(0, SyncedKind::Uuid);
        assert!(changes.uuids_changed);
        changes.clear();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_normalize_aligns_universes() {
        let mut changes = ChangeSet::new();
        changes.mark_added(100);
        changes.mark_deleted(2);
        changes.normalize();
        assert_eq!(changes.added.len(), changes.deleted.len());
        assert!(changes.added.contains(100));
        assert!(changes.deleted.contains(2));
    }
}
