//! Empires and players: command intake and tick-rate requests.
//!
//! A requested speed is the number of real nanoseconds one simulated second
//! should take. The sign carries pause state: positive is running, negative
//! is user-paused at that magnitude (so resuming restores the old rate), and
//! zero is reserved for the galaxy-level error pause — a player request is
//! never zero.

use stellar_component::{EmpireId, EntityReference};

use crate::command::Command;

/// Simulated-seconds-per-real-second steps a player cycles through.
pub const SPEED_STEPS: [u64; 15] = [
    1, 4, 10, 50, 200, 1_000, 5_000, 25_000, 60_000, 180_000, 500_000, 1_000_000, 2_000_000,
    5_000_000, 10_000_000,
];

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// One faction: owns colonies and a command queue drained by the driver at
/// tick start.
#[derive(Debug)]
pub struct Empire {
    id: EmpireId,
    name: String,
    pub funds: i64,
    colonies: Vec<EntityReference>,
    command_queue: Vec<Command>,
}

impl Empire {
    #[must_use]
    pub fn new(id: EmpireId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            funds: 0,
            colonies: Vec::new(),
            command_queue: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> EmpireId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a colony entity owned by this empire.
    pub fn add_colony(&mut self, colony: EntityReference) {
        self.colonies.push(colony);
    }

    #[must_use]
    pub fn colonies(&self) -> &[EntityReference] {
        &self.colonies
    }

    /// Queue a command for redistribution at the next tick start.
    pub fn queue_command(&mut self, command: Command) {
        self.command_queue.push(command);
    }

    /// Drain the queued commands, leaving the queue empty.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.command_queue)
    }
}

/// A human at the controls: owns an empire and a tick-rate request.
#[derive(Debug)]
pub struct Player {
    name: String,
    empire: EmpireId,
    requested_speed_ns: i64,
}

impl Player {
    /// New player running at 1 simulated second per real second.
    #[must_use]
    pub fn new(name: impl Into<String>, empire: EmpireId) -> Self {
        Self {
            name: name.into(),
            empire,
            requested_speed_ns: NANOS_PER_SECOND,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn empire(&self) -> EmpireId {
        self.empire
    }

    /// Signed request: real nanoseconds per simulated second, negative while
    /// paused.
    #[must_use]
    pub fn requested_speed_ns(&self) -> i64 {
        self.requested_speed_ns
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.requested_speed_ns < 0
    }

    /// Set the request directly. A non-positive magnitude pauses.
    pub fn request_speed(&mut self, speed_ns: i64) {
        self.requested_speed_ns = if speed_ns == 0 {
            -NANOS_PER_SECOND
        } else {
            speed_ns
        };
    }

    /// Move one step up the speed ladder, keeping pause state.
    pub fn increase_speed(&mut self) {
        let current = NANOS_PER_SECOND / self.magnitude();
        let next = SPEED_STEPS
            .iter()
            .copied()
            .find(|&step| step as i64 > current)
            .unwrap_or(SPEED_STEPS[SPEED_STEPS.len() - 1]);
        self.set_magnitude(NANOS_PER_SECOND / next as i64);
    }

    /// Move one step down the speed ladder, keeping pause state.
    pub fn decrease_speed(&mut self) {
        let current = NANOS_PER_SECOND / self.magnitude();
        let previous = SPEED_STEPS
            .iter()
            .rev()
            .copied()
            .find(|&step| (step as i64) < current)
            .unwrap_or(SPEED_STEPS[0]);
        self.set_magnitude(NANOS_PER_SECOND / previous as i64);
    }

    /// Flip between running and paused, retaining the magnitude.
    pub fn toggle_pause(&mut self) {
        self.requested_speed_ns = if self.requested_speed_ns == 0 {
            -NANOS_PER_SECOND
        } else {
            -self.requested_speed_ns
        };
    }

    fn magnitude(&self) -> i64 {
        self.requested_speed_ns.abs().max(1)
    }

    fn set_magnitude(&mut self, magnitude: i64) {
        let magnitude = magnitude.max(1);
        self.requested_speed_ns = if self.is_paused() { -magnitude } else { magnitude };
    }
}

/// The galaxy-wide speed implied by every player's request.
///
/// The slowest magnitude wins (largest nanoseconds per simulated second),
/// any paused player pauses everyone, and an empty player list means paused.
#[must_use]
pub fn effective_speed(players: &[Player]) -> i64 {
    let mut slowest = 0i64;
    let mut paused = players.is_empty();
    for player in players {
        if player.is_paused() {
            paused = true;
        }
        slowest = slowest.max(player.requested_speed_ns().abs());
    }
    if slowest == 0 {
        slowest = NANOS_PER_SECOND;
    }
    if paused { -slowest } else { slowest }
}
