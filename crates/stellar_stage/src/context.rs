//! Per-pass execution context passed to every stage.

use stellar_component::{
    ComponentStore, EmpireId, EntityHandle, SystemId, UuidComponent, UuidTable,
};

/// Everything a stage may touch during one scheduler pass.
///
/// Borrowed from the owning star system for the duration of the pass; the
/// dependency surface of a stage is exactly this struct.
#[derive(Debug)]
pub struct StageContext<'a> {
    /// The system's live component store.
    pub store: &'a mut ComponentStore,
    /// The system's uuid → handle table.
    pub ids: &'a mut UuidTable,
    /// Owning system.
    pub system_id: SystemId,
    /// Simulated seconds at the start of the current pass.
    pub time: u64,
    /// Galaxy tick counter for the tick this pass belongs to.
    pub tick: u64,
}

impl StageContext<'_> {
    /// Create an entity owned by `empire`, with a freshly allocated uuid
    /// bound in the table and carried as a [`UuidComponent`].
    pub fn create_entity(&mut self, empire: EmpireId) -> EntityHandle {
        let handle = self.store.create();
        let uuid = self.ids.allocate(empire);
        self.store.insert(handle, UuidComponent { uuid });
        self.ids.bind(uuid, handle);
        handle
    }

    /// Destroy an entity, unbinding its uuid.
    ///
    /// Returns `false` for a stale handle.
    pub fn destroy_entity(&mut self, handle: EntityHandle) -> bool {
        if let Some(uuid) = self.store.get::<UuidComponent>(handle).map(|c| c.uuid) {
            self.ids.unbind(&uuid);
        }
        self.store.destroy(handle)
    }
}
