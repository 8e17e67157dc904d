//! Durable entity identity across ticks and shadows.
//!
//! An [`EntityHandle`] can be recycled the moment its entity dies; an
//! [`EntityUuid`] never is. Anything that must survive a tick boundary — a
//! command target, a colony list entry, a selection — holds an
//! [`EntityReference`] and re-resolves the live handle through the owning
//! system's [`UuidTable`] when it needs one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityHandle;

/// Identifier of a star system within the galaxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId(pub u16);

impl std::fmt::Display for SystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "System({})", self.0)
    }
}

/// Identifier of an empire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmpireId(pub u16);

/// Stable identity assigned at entity creation and never reused.
///
/// Stays valid across handle recycling and across shadow generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityUuid {
    /// System the entity was created in.
    pub star_system_id: u16,
    /// Empire the entity was created for.
    pub empire_id: u16,
    /// Per-system monotonic counter value.
    pub entity_uid: u32,
}

impl std::fmt::Display for EntityUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.star_system_id, self.empire_id, self.entity_uid
        )
    }
}

/// A durable cross-tick, cross-shadow reference to an entity.
///
/// The embedded handle is a hint from the tick the reference was taken;
/// resolving against a shadow or live system yields the current handle for
/// the uuid, or nothing if the entity is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityReference {
    /// System the entity lived in when the reference was taken.
    pub system_id: SystemId,
    /// Handle as of the tick the reference was taken. May be stale.
    pub handle: EntityHandle,
    /// Durable identity.
    pub uuid: EntityUuid,
}

/// Per-system uuid → live handle table plus the uid counter.
///
/// Maintained by the live system as entities are created and destroyed; the
/// shadow full-copies the map whenever it changed during a tick.
#[derive(Debug)]
pub struct UuidTable {
    system_id: SystemId,
    next_uid: u32,
    map: HashMap<EntityUuid, EntityHandle>,
}

impl UuidTable {
    /// Create an empty table owned by `system_id`.
    #[must_use]
    pub fn new(system_id: SystemId) -> Self {
        Self {
            system_id,
            next_uid: 0,
            map: HashMap::new(),
        }
    }

    /// Returns the owning system id.
    #[must_use]
    pub fn system_id(&self) -> SystemId {
        self.system_id
    }

    /// Allocate a fresh uuid for an entity owned by `empire`.
    pub fn allocate(&mut self, empire: EmpireId) -> EntityUuid {
        let uid = self.next_uid;
        self.next_uid += 1;
        EntityUuid {
            star_system_id: self.system_id.0,
            empire_id: empire.0,
            entity_uid: uid,
        }
    }

    /// Associate a uuid with its current live handle.
    pub fn bind(&mut self, uuid: EntityUuid, handle: EntityHandle) {
        self.map.insert(uuid, handle);
    }

    /// Drop the association for a uuid, returning the handle it had.
    pub fn unbind(&mut self, uuid: &EntityUuid) -> Option<EntityHandle> {
        self.map.remove(uuid)
    }

    /// Look up the handle currently bound to a uuid.
    #[must_use]
    pub fn resolve(&self, uuid: &EntityUuid) -> Option<EntityHandle> {
        self.map.get(uuid).copied()
    }

    /// Borrow the underlying map (full-copied by shadows).
    #[must_use]
    pub fn as_map(&self) -> &HashMap<EntityUuid, EntityHandle> {
        &self.map
    }

    /// Number of bound uuids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if no uuid is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_monotonic() {
        let mut table = UuidTable::new(SystemId(3));
        let a = table.allocate(EmpireId(1));
        let b = table.allocate(EmpireId(1));
        assert_eq!(a.star_system_id, 3);
        assert_eq!(b.entity_uid, a.entity_uid + 1);
    }

    #[test]
    fn test_bind_resolve_unbind() {
        let mut table = UuidTable::new(SystemId(0));
        let uuid = table.allocate(EmpireId(0));
        let handle = EntityHandle::new(4, 0);
        table.bind(uuid, handle);
        assert_eq!(table.resolve(&uuid), Some(handle));
        assert_eq!(table.unbind(&uuid), Some(handle));
        assert_eq!(table.resolve(&uuid), None);
    }

    #[test]
    fn test_reference_serialization_roundtrip() {
        let reference = EntityReference {
            system_id: SystemId(2),
            handle: EntityHandle::new(9, 1),
            uuid: EntityUuid {
                star_system_id: 2,
                empire_id: 1,
                entity_uid: 77,
            },
        };
        let bytes = rmp_serde::to_vec(&reference).unwrap();
        let restored: EntityReference = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(reference, restored);
    }
}
