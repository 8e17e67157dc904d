//! # stellar_component
//!
//! The entity and component layer of the galaxy simulation core.
//!
//! This crate provides:
//!
//! - [`EntityHandle`] — index + generation entity identifiers.
//! - [`EntityArena`] — slot allocator with a free list and per-slot generations.
//! - [`ComponentStore`] — per-system component columns with change-tracking
//!   hooks feeding a per-tick [`ChangeSet`].
//! - [`ChangeSet`] — the added/changed/deleted record a shadow is rebuilt from.
//! - [`EntityUuid`] / [`EntityReference`] — durable cross-tick identity,
//!   distinct from possibly-recycled handles.

pub mod changeset;
pub mod components;
pub mod entity;
pub mod reference;
pub mod store;

pub use changeset::ChangeSet;
pub use components::{
    ColonyComponent, MassComponent, MovementComponent, NameComponent, OrbitComponent, SyncedKind,
    ThrustComponent, UuidComponent,
};
pub use entity::{EntityArena, EntityHandle};
pub use reference::{EmpireId, EntityReference, EntityUuid, SystemId, UuidTable};
pub use store::{Column, ComponentStore, StoreComponent};
