//! Galaxy driver: adaptive tick-rate control, work dispatch, and shadow
//! publication.
//!
//! One driver thread converts wall-clock time into ticks, releases the
//! worker pool, waits on the completion barrier, then swaps every system's
//! freshly built shadow with its published one under a single write-lock
//! acquisition — readers holding the read lock always observe one complete
//! whole-galaxy generation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock, RwLockReadGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use stellar_component::{EmpireId, SystemId};

use crate::command::{Command, CommandError};
use crate::empire::{Empire, Player, effective_speed};
use crate::lock;
use crate::shadow::{GalaxyShadow, ShadowGalaxy, ShadowStarSystem, SystemTickStats};
use crate::star_system::StarSystem;
use crate::worker;

const SECONDS_PER_DAY: u64 = 86_400;
const NANOS_PER_MILLI: u64 = 1_000_000;

/// Tunables of the driver loop. The reorder tolerance is a load-balancing
/// hint, not a correctness contract.
#[derive(Debug, Clone)]
pub struct GalaxyConfig {
    /// Worker thread count; defaults to available parallelism, minimum 1.
    pub worker_threads: Option<usize>,
    /// Divisor of the tick budget giving the schedule-reorder tolerance
    /// band; systems whose durations fall in the same band keep their order.
    pub reorder_tolerance_div: u32,
    /// After a stall, at most this many ticks' worth of real time is caught
    /// up; the rest of the simulated time is dropped.
    pub max_catchup_ticks: u64,
    /// Poll interval of the paused driver between wakeups.
    pub pause_poll: Duration,
}

impl Default for GalaxyConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            reorder_tolerance_div: 10,
            max_catchup_ticks: 10,
            pause_poll: Duration::from_secs(1),
        }
    }
}

pub(crate) struct SystemCell {
    pub(crate) live: Mutex<StarSystem>,
    pub(crate) last_update_ns: AtomicU64,
}

/// State shared between the driver, the workers, and the public handle.
pub(crate) struct GalaxyCore {
    pub(crate) config: GalaxyConfig,
    pub(crate) systems: Vec<SystemCell>,
    index_by_id: HashMap<SystemId, usize>,
    /// Claim order for the next tick; re-sorted slowest-first after each.
    pub(crate) schedule: RwLock<Vec<usize>>,
    /// The shadow lock: one generation of every published shadow.
    pub(crate) shadow: RwLock<GalaxyShadow>,
    empires: Mutex<Vec<Empire>>,
    players: Mutex<Vec<Player>>,
    pub(crate) taken: AtomicUsize,
    pub(crate) completed: AtomicUsize,
    pub(crate) work_generation: Mutex<u64>,
    pub(crate) work_available: Condvar,
    driver_gate: Mutex<()>,
    driver_wake: Condvar,
    pub(crate) tick: AtomicU64,
    pub(crate) sim_time: AtomicU64,
    pub(crate) day: AtomicU64,
    pub(crate) tick_size: AtomicU32,
    /// Real nanoseconds per simulated second. Positive: running; negative:
    /// user-paused at that magnitude; zero: paused by a failed update.
    pub(crate) speed_ns: AtomicI64,
    pub(crate) speed_limited: AtomicBool,
    pub(crate) shutdown: AtomicBool,
}

impl GalaxyCore {
    /// Run one full tick: advance time, dispatch commands, release the
    /// pool, wait for the barrier, publish.
    pub(crate) fn run_tick(&self, delta: u32) {
        let tick = self.tick.fetch_add(1, Ordering::AcqRel) + 1;
        let sim_time = self.sim_time.load(Ordering::Acquire) + u64::from(delta);
        self.sim_time.store(sim_time, Ordering::Release);
        self.day.store(sim_time / SECONDS_PER_DAY, Ordering::Release);
        self.tick_size.store(delta, Ordering::Release);

        self.dispatch_commands(tick);

        let count = self.systems.len();
        self.completed.store(0, Ordering::Release);
        self.taken.store(0, Ordering::Release);
        {
            let mut generation = lock::lock(&self.work_generation);
            *generation += 1;
        }
        self.work_available.notify_all();

        // Completion barrier: spin-yield rather than block, trading CPU for
        // publish latency. There is no portable way to lower this thread's
        // priority for the wait, so on saturated hosts the driver briefly
        // competes with its own workers here.
        while self.completed.load(Ordering::Acquire) < count {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }
            thread::yield_now();
        }

        self.publish(tick, sim_time);
    }

    /// Move queued empire commands to their systems, re-checking validity
    /// against the published shadow. Invalid commands are dropped here.
    fn dispatch_commands(&self, tick: u64) {
        let mut empires = lock::lock(&self.empires);
        let shadow = lock::read(&self.shadow);
        for empire in empires.iter_mut() {
            for command in empire.take_commands() {
                if !command.is_valid(&shadow) {
                    warn!(
                        empire = empire.id().0,
                        tick,
                        system = %command.system_id(),
                        "dropping command with stale target"
                    );
                    continue;
                }
                match self.index_by_id.get(&command.system_id()) {
                    Some(&index) => lock::lock(&self.systems[index].live).queue_command(command),
                    None => warn!(
                        empire = empire.id().0,
                        tick,
                        system = %command.system_id(),
                        "dropping command for unknown system"
                    ),
                }
            }
        }
    }

    /// Swap every system's building shadow with its published one, plus the
    /// galaxy shadow, under one write-lock acquisition.
    fn publish(&self, tick: u64, sim_time: u64) {
        let mut working = ShadowGalaxy {
            tick,
            sim_time,
            day: sim_time / SECONDS_PER_DAY,
            speed_ns: self.speed_ns.load(Ordering::Acquire),
            speed_limited: self.speed_limited.load(Ordering::Acquire),
            stats: Vec::with_capacity(self.systems.len()),
        };
        let mut shadow = lock::write(&self.shadow);
        for (index, cell) in self.systems.iter().enumerate() {
            let mut system = lock::lock(&cell.live);
            let (added, changed, deleted) = system.building().change().counts();
            working.stats.push(SystemTickStats {
                system_id: system.id(),
                name: system.name().to_string(),
                update: Duration::from_nanos(cell.last_update_ns.load(Ordering::Relaxed)),
                entities: system.building().entity_count(),
                added,
                changed,
                deleted,
            });
            std::mem::swap(system.building_mut(), &mut shadow.systems[index]);
        }
        shadow.galaxy = working;
    }

    /// Re-sort the claim order so the slowest systems are claimed first
    /// next tick. Durations are bucketed by the tolerance band so
    /// near-equal systems keep their relative order.
    pub(crate) fn resort_schedule(&self, tick_budget_ns: u64) {
        let tolerance =
            (tick_budget_ns / u64::from(self.config.reorder_tolerance_div.max(1))).max(1);
        let mut schedule = lock::write(&self.schedule);
        schedule.sort_by_key(|&index| {
            let duration = self.systems[index].last_update_ns.load(Ordering::Relaxed);
            std::cmp::Reverse(duration / tolerance)
        });
    }

    /// Recompute the effective speed from all player requests and wake the
    /// driver.
    fn update_speed(&self) {
        let players = lock::lock(&self.players);
        let speed = effective_speed(&players);
        drop(players);
        let previous = self.speed_ns.swap(speed, Ordering::AcqRel);
        if previous != speed {
            debug!(speed_ns = speed, "effective speed changed");
        }
        self.driver_wake.notify_all();
    }
}

/// Assembles the systems, empires, and players of a galaxy, then starts it.
#[derive(Default)]
pub struct GalaxyBuilder {
    config: GalaxyConfig,
    systems: Vec<StarSystem>,
    empires: Vec<Empire>,
    players: Vec<Player>,
}

impl GalaxyBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: GalaxyConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn system(mut self, system: StarSystem) -> Self {
        self.systems.push(system);
        self
    }

    #[must_use]
    pub fn empire(mut self, empire: Empire) -> Self {
        self.empires.push(empire);
        self
    }

    #[must_use]
    pub fn player(mut self, player: Player) -> Self {
        self.players.push(player);
        self
    }

    /// Spawn the worker pool and the driver thread, run a seed tick so the
    /// first published shadow already reflects seeded entities, and hand
    /// back the running galaxy.
    pub fn start(self) -> Galaxy {
        let mut systems = self.systems;
        for system in &mut systems {
            system.init(0, 0);
        }

        let shadows: Vec<ShadowStarSystem> = systems
            .iter()
            .map(|system| ShadowStarSystem::new(system.id(), system.name()))
            .collect();
        let index_by_id: HashMap<SystemId, usize> = systems
            .iter()
            .enumerate()
            .map(|(index, system)| (system.id(), index))
            .collect();
        let schedule: Vec<usize> = (0..systems.len()).collect();
        let speed = effective_speed(&self.players);

        let core = Arc::new(GalaxyCore {
            config: self.config,
            systems: systems
                .into_iter()
                .map(|system| SystemCell {
                    live: Mutex::new(system),
                    last_update_ns: AtomicU64::new(0),
                })
                .collect(),
            index_by_id,
            schedule: RwLock::new(schedule),
            shadow: RwLock::new(GalaxyShadow {
                systems: shadows,
                galaxy: ShadowGalaxy::default(),
            }),
            empires: Mutex::new(self.empires),
            players: Mutex::new(self.players),
            taken: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            work_generation: Mutex::new(0),
            work_available: Condvar::new(),
            driver_gate: Mutex::new(()),
            driver_wake: Condvar::new(),
            tick: AtomicU64::new(0),
            sim_time: AtomicU64::new(0),
            day: AtomicU64::new(0),
            tick_size: AtomicU32::new(0),
            speed_ns: AtomicI64::new(speed),
            speed_limited: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        });

        let worker_count = core
            .config
            .worker_threads
            .unwrap_or_else(|| {
                thread::available_parallelism()
                    .map(std::num::NonZeroUsize::get)
                    .unwrap_or(1)
            })
            .max(1);
        let workers: Vec<JoinHandle<()>> = (0..worker_count)
            .map(|worker_id| {
                let core = Arc::clone(&core);
                thread::spawn(move || worker::worker_loop(core, worker_id))
            })
            .collect();

        // Seed tick: zero simulated seconds, but it carries the seeded
        // entities into the first published shadow.
        core.run_tick(0);

        let driver = {
            let core = Arc::clone(&core);
            thread::spawn(move || drive(&core))
        };
        info!(
            workers = worker_count,
            systems = core.systems.len(),
            speed_ns = speed,
            "galaxy started"
        );

        Galaxy {
            core,
            workers,
            driver: Some(driver),
        }
    }
}

/// The public handle to a running galaxy.
///
/// Dropping the handle shuts the simulation down.
pub struct Galaxy {
    core: Arc<GalaxyCore>,
    workers: Vec<JoinHandle<()>>,
    driver: Option<JoinHandle<()>>,
}

impl Galaxy {
    #[must_use]
    pub fn builder() -> GalaxyBuilder {
        GalaxyBuilder::new()
    }

    /// Scoped read access to the published shadows. The guard pins one
    /// whole-galaxy generation; keep it short-lived.
    #[must_use]
    pub fn shadow(&self) -> RwLockReadGuard<'_, GalaxyShadow> {
        lock::read(&self.core.shadow)
    }

    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.core.tick.load(Ordering::Acquire)
    }

    /// Simulated seconds since start.
    #[must_use]
    pub fn sim_time(&self) -> u64 {
        self.core.sim_time.load(Ordering::Acquire)
    }

    /// Simulated days since start.
    #[must_use]
    pub fn day(&self) -> u64 {
        self.core.day.load(Ordering::Acquire)
    }

    /// Signed effective speed in real nanoseconds per simulated second:
    /// positive running, negative user-paused, zero error-paused.
    #[must_use]
    pub fn speed_ns(&self) -> i64 {
        self.core.speed_ns.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.speed_ns() <= 0
    }

    /// Whether the most recent tick cost more wall-clock time than its
    /// budget.
    #[must_use]
    pub fn is_speed_limited(&self) -> bool {
        self.core.speed_limited.load(Ordering::Acquire)
    }

    /// Queue a command into an empire's queue; it reaches its system at the
    /// next tick start.
    pub fn queue_command(&self, empire: EmpireId, command: Command) -> Result<(), CommandError> {
        let system = command.system_id();
        if !self.core.index_by_id.contains_key(&system) {
            return Err(CommandError::UnknownSystem(system));
        }
        let mut empires = lock::lock(&self.core.empires);
        let entry = empires
            .iter_mut()
            .find(|candidate| candidate.id() == empire)
            .ok_or(CommandError::UnknownEmpire(empire))?;
        entry.queue_command(command);
        Ok(())
    }

    /// Set a player's signed speed request directly.
    pub fn request_speed(&self, player: usize, speed_ns: i64) {
        self.with_player(player, |p| p.request_speed(speed_ns));
    }

    pub fn increase_speed(&self, player: usize) {
        self.with_player(player, Player::increase_speed);
    }

    pub fn decrease_speed(&self, player: usize) {
        self.with_player(player, Player::decrease_speed);
    }

    pub fn toggle_pause(&self, player: usize) {
        self.with_player(player, Player::toggle_pause);
    }

    fn with_player(&self, player: usize, apply: impl FnOnce(&mut Player)) {
        {
            let mut players = lock::lock(&self.core.players);
            let Some(entry) = players.get_mut(player) else {
                warn!(player, "speed request for unknown player");
                return;
            };
            apply(entry);
        }
        self.core.update_speed();
    }

    /// Stop the driver and the pool, joining every thread. Idempotent.
    pub fn shutdown(&mut self) {
        if self.core.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        // Bump the generation under its lock so a worker between its
        // predicate check and its park cannot miss this wakeup.
        {
            let mut generation = lock::lock(&self.core.work_generation);
            *generation += 1;
        }
        self.core.work_available.notify_all();
        drop(lock::lock(&self.core.driver_gate));
        self.core.driver_wake.notify_all();
        if let Some(driver) = self.driver.take() {
            let _ = driver.join();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        info!(tick = self.current_tick(), "galaxy stopped");
    }
}

impl Drop for Galaxy {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Simulated seconds to advance per tick at a given speed: one per tick
/// until a simulated second is cheaper than a millisecond of real time,
/// then enough to keep roughly one tick per millisecond.
fn compute_tick_size(speed_ns: i64) -> u32 {
    let speed_ns = speed_ns.max(1) as u64;
    if speed_ns >= NANOS_PER_MILLI {
        1
    } else {
        (NANOS_PER_MILLI / speed_ns).max(1) as u32
    }
}

/// The driver loop: wall-clock time in, ticks out.
fn drive(core: &Arc<GalaxyCore>) {
    let mut accumulator: u64 = 0;
    let mut last_speed: i64 = 0;
    let mut last_poll = Instant::now();

    while !core.shutdown.load(Ordering::Acquire) {
        let speed = core.speed_ns.load(Ordering::Acquire);
        if speed <= 0 {
            let gate = lock::lock(&core.driver_gate);
            let _ = core.driver_wake.wait_timeout(gate, core.config.pause_poll);
            last_poll = Instant::now();
            accumulator = 0;
            last_speed = speed;
            continue;
        }
        if speed != last_speed {
            accumulator = 0;
            last_speed = speed;
            debug!(speed_ns = speed, "tick rate adjusted");
        }

        let now = Instant::now();
        accumulator = accumulator.saturating_add((now - last_poll).as_nanos() as u64);
        last_poll = now;

        let tick_size = compute_tick_size(speed);
        let budget = u64::from(tick_size) * speed as u64;
        // After a long stall, drop simulated time instead of tick-storming.
        let cap = budget.saturating_mul(core.config.max_catchup_ticks.max(1));
        if accumulator > cap {
            accumulator = cap;
        }

        while accumulator >= budget {
            if core.shutdown.load(Ordering::Acquire) {
                return;
            }
            let start = Instant::now();
            core.run_tick(tick_size);
            accumulator -= budget;
            let cost = start.elapsed().as_nanos() as u64;
            core.speed_limited.store(cost > budget, Ordering::Release);
            core.resort_schedule(budget);
            if core.speed_ns.load(Ordering::Acquire) <= 0 {
                break; // a failed update paused the simulation mid-burst
            }
        }

        // Sleep until roughly a millisecond before the next tick is due.
        let deficit = budget.saturating_sub(accumulator);
        if deficit > NANOS_PER_MILLI {
            thread::sleep(Duration::from_nanos(deficit - NANOS_PER_MILLI));
        } else {
            thread::yield_now();
        }
    }
}
