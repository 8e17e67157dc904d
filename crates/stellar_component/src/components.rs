//! Component types carried by star-system entities.
//!
//! Only the types in the synchronized subset ([`SyncedKind`]) are ever
//! mirrored into a shadow; the rest are simulation-internal and invisible to
//! readers.

use serde::{Deserialize, Serialize};

use crate::entity::EntityHandle;
use crate::reference::EntityUuid;

/// Display name of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameComponent {
    pub name: String,
}

impl NameComponent {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Position and velocity in system-local space.
///
/// Positions are integer metres so they stay exact at interplanetary ranges;
/// velocities are metres per simulated second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementComponent {
    pub position: [i64; 2],
    pub velocity: [f64; 2],
}

/// Applied thrust in newtons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrustComponent {
    pub thrust: [f64; 2],
}

/// Mass in kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassComponent {
    pub kg: f64,
}

/// Circular orbit around a parent entity. Simulation-internal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitComponent {
    /// Entity orbited around.
    pub parent: EntityHandle,
    /// Orbit radius in metres.
    pub radius_m: i64,
    /// Orbital period in simulated seconds.
    pub period_s: u64,
    /// Phase offset at time zero, in degrees.
    pub phase_deg: f64,
}

/// Colony state. Simulation-internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyComponent {
    pub population: u64,
    pub infrastructure: u32,
}

/// Durable identity carrier, present on every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UuidComponent {
    pub uuid: EntityUuid,
}

/// Dense index for each synchronized component type.
///
/// The per-type changed bitsets in a
/// [`ChangeSet`](crate::changeset::ChangeSet) are addressed by this index,
/// so shadow updates copy only the types that actually changed for an
/// entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncedKind {
    Name = 0,
    Movement = 1,
    Thrust = 2,
    Uuid = 3,
}

impl SyncedKind {
    /// Number of synchronized component types.
    pub const COUNT: usize = 4;

    /// All synchronized kinds, in dense-index order.
    pub const ALL: [SyncedKind; Self::COUNT] = [
        SyncedKind::Name,
        SyncedKind::Movement,
        SyncedKind::Thrust,
        SyncedKind::Uuid,
    ];

    /// Returns the dense index of this kind.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synced_kind_indices_are_dense() {
        for (expected, kind) in SyncedKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), expected);
        }
    }

    #[test]
    fn test_movement_serialization_roundtrip() {
        let movement = MovementComponent {
            position: [149_597_870_700, -42],
            velocity: [29.78e3, 0.0],
        };
        let bytes = rmp_serde::to_vec(&movement).unwrap();
        let restored: MovementComponent = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(movement, restored);
    }
}
