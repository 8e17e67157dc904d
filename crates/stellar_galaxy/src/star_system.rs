//! One star system: live store, stage pipeline, command intake, and the
//! shadow it rebuilds each tick.
//!
//! The live [`ComponentStore`] is only ever touched by the worker that
//! claimed the system for the current tick, so nothing here is synchronized;
//! the galaxy wraps each system in a mutex and hands out exclusive access.

use tracing::warn;

use stellar_component::{
    ComponentStore, EmpireId, EntityHandle, EntityReference, MovementComponent, NameComponent,
    SystemId, ThrustComponent, UuidComponent, UuidTable,
};
use stellar_stage::{SimulationStage, StageContext, StageScheduler};

use crate::command::{Command, CommandError};
use crate::shadow::ShadowStarSystem;

pub struct StarSystem {
    id: SystemId,
    name: String,
    store: ComponentStore,
    ids: UuidTable,
    scheduler: StageScheduler,
    commands: Vec<Command>,
    building: ShadowStarSystem,
}

impl std::fmt::Debug for StarSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StarSystem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entities", &self.store.len())
            .field("stages", &self.scheduler.len())
            .finish()
    }
}

impl StarSystem {
    #[must_use]
    pub fn new(id: SystemId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            building: ShadowStarSystem::new(id, name.clone()),
            name,
            store: ComponentStore::new(),
            ids: UuidTable::new(id),
            scheduler: StageScheduler::new(),
            commands: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SystemId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.store
    }

    /// Register a stage; stages run in registration order every tick.
    pub fn attach_stage<S: SimulationStage + 'static>(&mut self, stage: S) {
        self.scheduler.attach(stage);
    }

    /// Initialise all stages. Called once before the first tick.
    pub fn init(&mut self, tick: u64, time: u64) {
        let mut ctx = StageContext {
            store: &mut self.store,
            ids: &mut self.ids,
            system_id: self.id,
            time,
            tick,
        };
        self.scheduler.init_all(&mut ctx);
    }

    /// Seed an entity owned by `empire`, with a bound uuid.
    pub fn create_entity(&mut self, empire: EmpireId) -> EntityHandle {
        let handle = self.store.create();
        let uuid = self.ids.allocate(empire);
        self.store.insert(handle, UuidComponent { uuid });
        self.ids.bind(uuid, handle);
        handle
    }

    /// Destroy an entity, unbinding its uuid. Returns `false` for a stale
    /// handle.
    pub fn destroy_entity(&mut self, handle: EntityHandle) -> bool {
        if let Some(uuid) = self.store.get::<UuidComponent>(handle).map(|c| c.uuid) {
            self.ids.unbind(&uuid);
        }
        self.store.destroy(handle)
    }

    /// Durable reference to a live entity.
    #[must_use]
    pub fn entity_reference(&self, handle: EntityHandle) -> Option<EntityReference> {
        let uuid = self.store.get::<UuidComponent>(handle)?.uuid;
        Some(EntityReference {
            system_id: self.id,
            handle,
            uuid,
        })
    }

    /// Queue a command for application at the start of the next update.
    pub fn queue_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Advance this system by `delta` simulated seconds.
    ///
    /// Order per tick: apply queued commands, run the stage pipeline, then
    /// reconcile the building shadow from the drained change log so the
    /// publish step finds it fully caught up.
    pub fn update(&mut self, tick: u64, time: u64, delta: u32, published: &ShadowStarSystem) {
        for command in std::mem::take(&mut self.commands) {
            if let Err(error) = self.apply_command(command) {
                warn!(system = %self.id, tick, %error, "dropping invalid command");
            }
        }

        let mut ctx = StageContext {
            store: &mut self.store,
            ids: &mut self.ids,
            system_id: self.id,
            time,
            tick,
        };
        self.scheduler.run(&mut ctx, delta);

        let fresh = self.store.take_changes();
        self.building.reconcile(&self.store, fresh, published, &self.ids);
    }

    /// The shadow currently under construction; swapped with the published
    /// one by the galaxy's publish step.
    pub(crate) fn building_mut(&mut self) -> &mut ShadowStarSystem {
        &mut self.building
    }

    pub(crate) fn building(&self) -> &ShadowStarSystem {
        &self.building
    }

    fn apply_command(&mut self, command: Command) -> Result<(), CommandError> {
        let target = command.target();
        if target.system_id != self.id {
            return Err(CommandError::MisroutedTarget {
                target: target.system_id,
                reached: self.id,
            });
        }
        let stale = || CommandError::StaleTarget {
            system: self.id,
            uuid: target.uuid,
        };
        let handle = self.ids.resolve(&target.uuid).ok_or_else(stale)?;
        if !self.store.contains(handle) {
            return Err(stale());
        }
        match command {
            Command::MoveTo { position, .. } => {
                if let Some(movement) = self.store.get_mut::<MovementComponent>(handle) {
                    movement.position = position;
                } else {
                    self.store.insert(
                        handle,
                        MovementComponent {
                            position,
                            velocity: [0.0; 2],
                        },
                    );
                }
            }
            Command::Rename { name, .. } => {
                if let Some(existing) = self.store.get_mut::<NameComponent>(handle) {
                    existing.name = name;
                } else {
                    self.store.insert(handle, NameComponent { name });
                }
            }
            Command::SetThrust { thrust, .. } => {
                self.store.insert(handle, ThrustComponent { thrust });
            }
        }
        Ok(())
    }
}
