//! Entity handles and the slot arena that allocates them.
//!
//! An [`EntityHandle`] is an index + generation pair. The index addresses a
//! slot in the owning [`EntityArena`]; the generation detects handles that
//! outlived their entity after the slot was recycled.

use serde::{Deserialize, Serialize};

/// A possibly-recycled entity identifier: slot index plus generation.
///
/// Two handles with the same index but different generations refer to
/// different entity lifetimes. Durable cross-tick identity is provided by
/// [`EntityUuid`](crate::EntityUuid), not by handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle {
    index: u32,
    generation: u32,
}

impl EntityHandle {
    /// Create a handle from raw parts.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation the slot had when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Index + generation entity allocator with a free list.
///
/// Live stores allocate through [`EntityArena::create`]. Mirror (shadow)
/// stores instead use [`EntityArena::create_at`] so an entity occupies the
/// same index and generation as its live counterpart and handles compare
/// equal across stores. The two allocation paths must not be mixed on one
/// arena.
#[derive(Debug, Default)]
pub struct EntityArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl EntityArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an entity, reusing a free slot if one exists.
    ///
    /// A reused slot keeps the generation it was given when its previous
    /// occupant was destroyed, so stale handles to it no longer validate.
    pub fn create(&mut self) -> EntityHandle {
        while let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            if slot.alive {
                continue;
            }
            slot.alive = true;
            self.live += 1;
            return EntityHandle::new(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len()).expect("entity index overflow");
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        self.live += 1;
        EntityHandle::new(index, 0)
    }

    /// Materialise an entity at a caller-chosen index and generation.
    ///
    /// Used by shadow stores to mirror a live entity. Grows the slot vector
    /// as needed; intermediate slots stay dead and unallocatable.
    pub fn create_at(&mut self, index: u32, generation: u32) -> EntityHandle {
        let idx = index as usize;
        if idx >= self.slots.len() {
            self.slots.resize(
                idx + 1,
                Slot {
                    generation: 0,
                    alive: false,
                },
            );
        }
        let slot = &mut self.slots[idx];
        debug_assert!(!slot.alive, "create_at over a live slot");
        if !slot.alive {
            self.live += 1;
        }
        *slot = Slot {
            generation,
            alive: true,
        };
        EntityHandle::new(index, generation)
    }

    /// Destroy an entity, bumping the slot generation and freeing the slot.
    ///
    /// Returns `false` if the handle was stale or never issued.
    pub fn destroy(&mut self, handle: EntityHandle) -> bool {
        if !self.contains(handle) {
            return false;
        }
        let slot = &mut self.slots[handle.index() as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.live -= 1;
        true
    }

    /// Returns `true` if the handle refers to a live entity of the current
    /// generation.
    #[must_use]
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.slots
            .get(handle.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == handle.generation())
    }

    /// Returns the current generation of a slot, if that slot is live.
    #[must_use]
    pub fn generation_of(&self, index: u32) -> Option<u32> {
        self.slots
            .get(index as usize)
            .filter(|slot| slot.alive)
            .map(|slot| slot.generation)
    }

    /// Returns the live handle at `index`, if any.
    #[must_use]
    pub fn handle_at(&self, index: u32) -> Option<EntityHandle> {
        self.generation_of(index)
            .map(|generation| EntityHandle::new(index, generation))
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no entity is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over all live handles in index order.
    pub fn iter(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.alive
                .then(|| EntityHandle::new(index as u32, slot.generation))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_issues_distinct_indices() {
        let mut arena = EntityArena::new();
        let a = arena.create();
        let b = arena.create();
        assert_ne!(a.index(), b.index());
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_destroyed_handle_is_stale() {
        let mut arena = EntityArena::new();
        let a = arena.create();
        assert!(arena.destroy(a));
        assert!(!arena.contains(a));
        assert!(!arena.destroy(a));
    }

    #[test]
    fn test_recycled_slot_bumps_generation() {
        let mut arena = EntityArena::new();
        let a = arena.create();
        arena.destroy(a);
        let b = arena.create();
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(arena.contains(b));
        assert!(!arena.contains(a));
    }

    #[test]
    fn test_create_at_mirrors_index_and_generation() {
        let mut arena = EntityArena::new();
        let h = arena.create_at(5, 3);
        assert_eq!(h, EntityHandle::new(5, 3));
        assert!(arena.contains(h));
        assert_eq!(arena.len(), 1);
        // Intermediate slots stay dead.
        assert!(arena.generation_of(2).is_none());
    }

    #[test]
    fn test_iter_yields_live_handles_in_index_order() {
        let mut arena = EntityArena::new();
        let a = arena.create();
        let b = arena.create();
        let c = arena.create();
        arena.destroy(b);
        let handles: Vec<_> = arena.iter().collect();
        assert_eq!(handles, vec![a, c]);
    }

    #[test]
    fn test_handle_serialization_roundtrip() {
        let handle = EntityHandle::new(7, 2);
        let bytes = rmp_serde::to_vec(&handle).unwrap();
        let restored: EntityHandle = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(handle, restored);
    }
}
