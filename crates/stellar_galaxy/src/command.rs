//! Player-issued orders and their validation errors.
//!
//! Commands are queued into an [`Empire`](crate::empire::Empire) queue, then
//! redistributed by the driver at tick start to the owning star system after
//! a validity re-check against the published shadow, and finally applied by
//! that system before its stage pipeline runs. An invalid command is logged
//! and dropped, never applied.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stellar_component::{EmpireId, EntityReference, EntityUuid, SystemId};

use crate::shadow::GalaxyShadow;

/// An order against one entity, carried by durable [`EntityReference`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Place the target at a system-local position.
    MoveTo {
        target: EntityReference,
        position: [i64; 2],
    },
    /// Rename the target.
    Rename {
        target: EntityReference,
        name: String,
    },
    /// Set the target's applied thrust.
    SetThrust {
        target: EntityReference,
        thrust: [f64; 2],
    },
}

impl Command {
    /// The entity this command acts on.
    #[must_use]
    pub fn target(&self) -> EntityReference {
        match self {
            Command::MoveTo { target, .. }
            | Command::Rename { target, .. }
            | Command::SetThrust { target, .. } => *target,
        }
    }

    /// The star system the command must be routed to.
    #[must_use]
    pub fn system_id(&self) -> SystemId {
        self.target().system_id
    }

    /// Pre-dispatch check against the published shadow: the target's system
    /// exists and its uuid still resolves there.
    #[must_use]
    pub fn is_valid(&self, shadow: &GalaxyShadow) -> bool {
        let target = self.target();
        shadow
            .system(target.system_id)
            .is_some_and(|system| system.resolve(&target).is_some())
    }
}

/// Why a command could not be queued or applied.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no empire {0:?} in this galaxy")]
    UnknownEmpire(EmpireId),
    #[error("no star system {0} in this galaxy")]
    UnknownSystem(SystemId),
    #[error("command targets {target} but reached {reached}")]
    MisroutedTarget { target: SystemId, reached: SystemId },
    #[error("target {uuid} is gone from {system}")]
    StaleTarget { system: SystemId, uuid: EntityUuid },
}
