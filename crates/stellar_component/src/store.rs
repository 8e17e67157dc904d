//! Per-system component storage with change-tracking hooks.
//!
//! [`ComponentStore`] owns the entity arena, one column per component type,
//! and the per-tick [`ChangeSet`] change log. Creating or destroying an
//! entity, and any mutation of a synchronized component type, is recorded in
//! the log so the shadow can be brought up to date incrementally at the end
//! of the tick.
//!
//! Shadow (mirror) stores use the `create_at` / `destroy_at` / `raw` entry
//! points, which bypass the log: a mirror records nothing, it only receives.

use crate::changeset::ChangeSet;
use crate::components::{
    ColonyComponent, MassComponent, MovementComponent, NameComponent, OrbitComponent, SyncedKind,
    ThrustComponent, UuidComponent,
};
use crate::entity::{EntityArena, EntityHandle};

/// Dense per-index storage for one component type.
#[derive(Debug)]
pub struct Column<T> {
    items: Vec<Option<T>>,
}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Column<T> {
    /// Returns the component at `index`, if present.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.items.get(index as usize).and_then(Option::as_ref)
    }

    /// Returns the component at `index` mutably, if present.
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.items.get_mut(index as usize).and_then(Option::as_mut)
    }

    /// Store a component at `index`, returning the previous value.
    pub fn set(&mut self, index: u32, value: T) -> Option<T> {
        let index = index as usize;
        if index >= self.items.len() {
            self.items.resize_with(index + 1, || None);
        }
        self.items[index].replace(value)
    }

    /// Remove and return the component at `index`.
    pub fn take(&mut self, index: u32) -> Option<T> {
        self.items.get_mut(index as usize).and_then(Option::take)
    }

    /// Returns `true` if a component is present at `index`.
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.items
            .get(index as usize)
            .is_some_and(Option::is_some)
    }
}

/// Maps a component type to its column in a [`ComponentStore`] and declares
/// whether it belongs to the synchronized subset.
pub trait StoreComponent: Sized {
    /// Dense synchronized index, or `None` for simulation-internal types.
    const SYNCED: Option<SyncedKind>;

    fn column(store: &ComponentStore) -> &Column<Self>;
    fn column_mut(store: &mut ComponentStore) -> &mut Column<Self>;
}

macro_rules! impl_store_component {
    ($ty:ty, $field:ident, $synced:expr) => {
        impl StoreComponent for $ty {
            const SYNCED: Option<SyncedKind> = $synced;

            fn column(store: &ComponentStore) -> &Column<Self> {
                &store.$field
            }

            fn column_mut(store: &mut ComponentStore) -> &mut Column<Self> {
                &mut store.$field
            }
        }
    };
}

impl_store_component!(NameComponent, names, Some(SyncedKind::Name));
impl_store_component!(MovementComponent, movement, Some(SyncedKind::Movement));
impl_store_component!(ThrustComponent, thrust, Some(SyncedKind::Thrust));
impl_store_component!(UuidComponent, uuids, Some(SyncedKind::Uuid));
impl_store_component!(MassComponent, mass, None);
impl_store_component!(OrbitComponent, orbits, None);
impl_store_component!(ColonyComponent, colonies, None);

/// Entity arena plus one column per component type, with a change log.
#[derive(Debug, Default)]
pub struct ComponentStore {
    arena: EntityArena,
    names: Column<NameComponent>,
    movement: Column<MovementComponent>,
    thrust: Column<ThrustComponent>,
    mass: Column<MassComponent>,
    orbits: Column<OrbitComponent>,
    colonies: Column<ColonyComponent>,
    uuids: Column<UuidComponent>,
    changes: ChangeSet,
}

impl ComponentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity and record it as added this tick.
    pub fn create(&mut self) -> EntityHandle {
        let handle = self.arena.create();
        self.changes.mark_added(handle.index());
        handle
    }

    /// Destroy an entity, dropping all its components, and record the
    /// deletion. Returns `false` for a stale handle.
    pub fn destroy(&mut self, handle: EntityHandle) -> bool {
        if !self.arena.contains(handle) {
            return false;
        }
        let index = handle.index();
        self.names.take(index);
        self.movement.take(index);
        self.thrust.take(index);
        self.mass.take(index);
        self.orbits.take(index);
        self.colonies.take(index);
        if self.uuids.take(index).is_some() {
            self.changes.uuids_changed = true;
        }
        self.changes.mark_deleted(index);
        self.arena.destroy(handle)
    }

    /// Returns `true` if the handle refers to a live entity.
    #[must_use]
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.arena.contains(handle)
    }

    /// Returns the component of type `T` on an entity, if any.
    #[must_use]
    pub fn get<T: StoreComponent>(&self, handle: EntityHandle) -> Option<&T> {
        if !self.arena.contains(handle) {
            return None;
        }
        T::column(self).get(handle.index())
    }

    /// Returns the component of type `T` mutably, recording a change for
    /// synchronized types.
    pub fn get_mut<T: StoreComponent>(&mut self, handle: EntityHandle) -> Option<&mut T> {
        if !self.arena.contains(handle) || !T::column(self).contains(handle.index()) {
            return None;
        }
        if let Some(kind) = T::SYNCED {
            self.changes.mark_changed(handle.index(), kind);
        }
        T::column_mut(self).get_mut(handle.index())
    }

    /// Attach (or replace) a component, recording a change for synchronized
    /// types. Returns `false` for a stale handle.
    pub fn insert<T: StoreComponent>(&mut self, handle: EntityHandle, value: T) -> bool {
        if !self.arena.contains(handle) {
            return false;
        }
        T::column_mut(self).set(handle.index(), value);
        if let Some(kind) = T::SYNCED {
            self.changes.mark_changed(handle.index(), kind);
        }
        true
    }

    /// Detach and return a component, recording a change for synchronized
    /// types.
    pub fn remove<T: StoreComponent>(&mut self, handle: EntityHandle) -> Option<T> {
        if !self.arena.contains(handle) {
            return None;
        }
        let removed = T::column_mut(self).take(handle.index());
        if removed.is_some()
            && let Some(kind) = T::SYNCED
        {
            self.changes.mark_changed(handle.index(), kind);
        }
        removed
    }

    /// Drain this tick's change log, leaving an empty one behind.
    pub fn take_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.changes)
    }

    /// Borrow this tick's change log.
    #[must_use]
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Returns the live handle at `index`, if any.
    #[must_use]
    pub fn handle_at(&self, index: u32) -> Option<EntityHandle> {
        self.arena.handle_at(index)
    }

    /// Iterate over all live handles in index order.
    pub fn entities(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        self.arena.iter()
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns `true` if no entity is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    // --- mirror-store entry points (no change logging) ---

    /// Materialise an entity at a live store's index and generation.
    pub fn create_at(&mut self, index: u32, generation: u32) -> EntityHandle {
        self.arena.create_at(index, generation)
    }

    /// Destroy whatever entity occupies `index`, dropping its components.
    /// Returns `false` if the slot was already dead.
    pub fn destroy_at(&mut self, index: u32) -> bool {
        let Some(handle) = self.arena.handle_at(index) else {
            return false;
        };
        self.names.take(index);
        self.movement.take(index);
        self.thrust.take(index);
        self.mass.take(index);
        self.orbits.take(index);
        self.colonies.take(index);
        self.uuids.take(index);
        self.arena.destroy(handle)
    }

    /// Raw column access for mirror writes.
    #[must_use]
    pub fn raw<T: StoreComponent>(&self) -> &Column<T> {
        T::column(self)
    }

    /// Raw mutable column access for mirror writes.
    pub fn raw_mut<T: StoreComponent>(&mut self) -> &mut Column<T> {
        T::column_mut(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_marks_added() {
        let mut store = ComponentStore::new();
        let e = store.create();
        assert!(store.changes().added.contains(e.index() as usize));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_synced_insert_marks_changed_with_type_bit() {
        let mut store = ComponentStore::new();
        let e = store.create();
        store.insert(e, MovementComponent::default());
        let changes = store.changes();
        assert!(changes.changed.contains(e.index() as usize));
        assert!(
            changes.changed_components[SyncedKind::Movement.index()].contains(e.index() as usize)
        );
    }

    #[test]
    fn test_internal_component_leaves_log_untouched() {
        let mut store = ComponentStore::new();
        let e = store.create();
        let before = store.changes().changed.count_ones(..);
        store.insert(e, MassComponent { kg: 1.0e3 });
        store.get_mut::<MassComponent>(e).unwrap().kg = 2.0e3;
        assert_eq!(store.changes().changed.count_ones(..), before);
    }

    #[test]
    fn test_destroy_marks_deleted_and_uuid_flag() {
        let mut store = ComponentStore::new();
        let e = store.create();
        store.insert(
            e,
            UuidComponent {
                uuid: crate::EntityUuid {
                    star_system_id: 0,
                    empire_id: 0,
                    entity_uid: 1,
                },
            },
        );
        let _ = store.take_changes();
        assert!(store.destroy(e));
        let changes = store.changes();
        assert!(changes.deleted.contains(e.index() as usize));
        assert!(changes.uuids_changed);
        assert!(!store.contains(e));
    }

    #[test]
    fn test_get_mut_marks_changed() {
        let mut store = ComponentStore::new();
        let e = store.create();
        store.insert(e, NameComponent::new("Sol"));
        let _ = store.take_changes();
        store.get_mut::<NameComponent>(e).unwrap().name = "Sol Prime".to_string();
        assert!(store.changes().changed.contains(e.index() as usize));
        assert!(
            store.changes().changed_components[SyncedKind::Name.index()]
                .contains(e.index() as usize)
        );
    }

    #[test]
    fn test_take_changes_drains_log() {
        let mut store = ComponentStore::new();
        let e = store.create();
        store.insert(e, ThrustComponent::default());
        let taken = store.take_changes();
        assert!(!taken.is_empty());
        assert!(store.changes().is_empty());
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut store = ComponentStore::new();
        let e = store.create();
        store.destroy(e);
        assert!(!store.insert(e, NameComponent::new("ghost")));
        assert!(store.get::<NameComponent>(e).is_none());
    }

    #[test]
    fn test_mirror_paths_do_not_log() {
        let mut store = ComponentStore::new();
        let e = store.create_at(4, 7);
        store.raw_mut::<NameComponent>().set(4, NameComponent::new("mirror"));
        assert!(store.changes().is_empty());
        assert!(store.destroy_at(4));
        assert!(store.changes().is_empty());
        assert!(!store.contains(e));
    }
}
