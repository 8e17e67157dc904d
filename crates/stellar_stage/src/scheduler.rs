//! Stage scheduler — ordered execution with sub-stepping and timing.
//!
//! Stages run in registration order once per pass. When a tick advances more
//! simulated time than [`STABLE_STEP`], the scheduler splits the delta into a
//! bulk of equal medium-sized passes plus a remainder of 1-second passes, so
//! kinematic stages never integrate across a step large enough to hurt
//! accuracy.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::context::StageContext;

/// Largest simulated-seconds delta a stage update is ever handed.
pub const STABLE_STEP: u32 = 100;

/// A named unit of per-tick work inside one star system.
///
/// `is_active` is evaluated once per scheduler pass for every stage before
/// any stage updates; a stage that declares itself inactive is skipped for
/// that pass but still appears in the timing record.
pub trait SimulationStage: Send {
    /// Stage name used in logs and timing records.
    fn name(&self) -> &'static str;

    /// One-time setup, called when the owning system initialises.
    fn init(&mut self, _ctx: &mut StageContext<'_>) {}

    /// Whether this stage wants to run this pass (cadence gate).
    fn is_active(&self, _ctx: &StageContext<'_>) -> bool {
        true
    }

    /// Advance the stage by `delta` simulated seconds.
    fn update(&mut self, ctx: &mut StageContext<'_>, delta: u32);
}

/// Wall-clock cost of one stage during the most recent pass.
#[derive(Debug, Clone, Copy)]
pub struct StageTiming {
    pub name: &'static str,
    pub duration: Duration,
    pub active: bool,
}

/// Runs the registered stage list for one star system.
#[derive(Default)]
pub struct StageScheduler {
    stages: Vec<Box<dyn SimulationStage>>,
    profiling: bool,
    timings: Vec<StageTiming>,
}

impl std::fmt::Debug for StageScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageScheduler")
            .field("stages", &self.stages.len())
            .field("profiling", &self.profiling)
            .finish()
    }
}

impl StageScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage. Stages run in registration order.
    pub fn attach<S: SimulationStage + 'static>(&mut self, stage: S) {
        self.stages.push(Box::new(stage));
    }

    /// Number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if no stage is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Initialise every stage, in registration order.
    pub fn init_all(&mut self, ctx: &mut StageContext<'_>) {
        for stage in &mut self.stages {
            debug!(stage = stage.name(), system = %ctx.system_id, "stage init");
            stage.init(ctx);
        }
    }

    /// Enable or disable per-stage timing collection.
    pub fn set_profiling(&mut self, enabled: bool) {
        self.profiling = enabled;
    }

    /// Timing records from the most recent pass (empty unless profiling).
    #[must_use]
    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    /// Advance all stages by `delta` simulated seconds, sub-stepping so no
    /// single pass exceeds [`STABLE_STEP`]. `ctx.time` ends up advanced by
    /// exactly `delta`.
    pub fn run(&mut self, ctx: &mut StageContext<'_>, delta: u32) {
        if delta <= STABLE_STEP {
            for _ in 0..delta {
                self.pass(ctx, 1);
                ctx.time += 1;
            }
            return;
        }

        let step = 1 + delta / STABLE_STEP;
        let bulk = delta / step;
        for _ in 0..bulk {
            self.pass(ctx, step);
            ctx.time += u64::from(step);
        }
        for _ in 0..delta - step * bulk {
            self.pass(ctx, 1);
            ctx.time += 1;
        }
    }

    /// One pass: evaluate every stage's activity gate, then update the
    /// active ones in order.
    fn pass(&mut self, ctx: &mut StageContext<'_>, delta: u32) {
        let active: Vec<bool> = self.stages.iter().map(|s| s.is_active(ctx)).collect();

        if self.profiling {
            self.timings.clear();
            for (stage, active) in self.stages.iter_mut().zip(&active) {
                let start = Instant::now();
                if *active {
                    stage.update(ctx, delta);
                }
                self.timings.push(StageTiming {
                    name: stage.name(),
                    duration: start.elapsed(),
                    active: *active,
                });
            }
        } else {
            for (stage, active) in self.stages.iter_mut().zip(&active) {
                if *active {
                    stage.update(ctx, delta);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use stellar_component::{ComponentStore, SystemId, UuidTable};

    #[derive(Debug, Default)]
    struct Recorded {
        total: u32,
        max_step: u32,
        passes: u32,
    }

    struct Recorder(Arc<Mutex<Recorded>>);

    impl SimulationStage for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn update(&mut self, _ctx: &mut StageContext<'_>, delta: u32) {
            let mut rec = self.0.lock().unwrap();
            rec.total += delta;
            rec.max_step = rec.max_step.max(delta);
            rec.passes += 1;
        }
    }

    struct EveryN {
        interval: u64,
        next_run: u64,
        runs: Arc<Mutex<u32>>,
    }

    impl SimulationStage for EveryN {
        fn name(&self) -> &'static str {
            "every_n"
        }

        fn is_active(&self, ctx: &StageContext<'_>) -> bool {
            ctx.time >= self.next_run
        }

        fn update(&mut self, ctx: &mut StageContext<'_>, _delta: u32) {
            *self.runs.lock().unwrap() += 1;
            self.next_run = ctx.time + self.interval;
        }
    }

    fn run_scheduler(scheduler: &mut StageScheduler, delta: u32) -> u64 {
        let mut store = ComponentStore::new();
        let mut ids = UuidTable::new(SystemId(0));
        let mut ctx = StageContext {
            store: &mut store,
            ids: &mut ids,
            system_id: SystemId(0),
            time: 0,
            tick: 1,
        };
        scheduler.run(&mut ctx, delta);
        ctx.time
    }

    #[test]
    fn test_small_delta_runs_second_by_second() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut scheduler = StageScheduler::new();
        scheduler.attach(Recorder(recorded.clone()));
        let time = run_scheduler(&mut scheduler, 5);
        assert_eq!(time, 5);
        let rec = recorded.lock().unwrap();
        assert_eq!(rec.total, 5);
        assert_eq!(rec.max_step, 1);
        assert_eq!(rec.passes, 5);
    }

    #[test]
    fn test_substeps_sum_to_delta_and_stay_bounded() {
        for delta in [1u32, 99, 100, 101, 250, 1000, 5000, 86_400] {
            let recorded = Arc::new(Mutex::new(Recorded::default()));
            let mut scheduler = StageScheduler::new();
            scheduler.attach(Recorder(recorded.clone()));
            let time = run_scheduler(&mut scheduler, delta);
            assert_eq!(time, u64::from(delta), "time advance for {delta}");
            let rec = recorded.lock().unwrap();
            assert_eq!(rec.total, delta, "total advanced for {delta}");
            assert!(
                rec.max_step <= 1 + delta / STABLE_STEP,
                "step bound for {delta}: {}",
                rec.max_step
            );
        }
    }

    #[test]
    fn test_cadence_gate_limits_runs() {
        let runs = Arc::new(Mutex::new(0));
        let mut scheduler = StageScheduler::new();
        scheduler.attach(EveryN {
            interval: 60,
            next_run: 0,
            runs: runs.clone(),
        });
        let time = run_scheduler(&mut scheduler, 90);
        assert_eq!(time, 90);
        // Due at t=0 and again at t=60; not yet at t=120.
        assert_eq!(*runs.lock().unwrap(), 2);
    }

    #[test]
    fn test_profiling_records_inactive_stages() {
        let mut scheduler = StageScheduler::new();
        scheduler.set_profiling(true);
        scheduler.attach(EveryN {
            interval: 1_000_000,
            next_run: 1, // never due at time 0
            runs: Arc::new(Mutex::new(0)),
        });
        run_scheduler(&mut scheduler, 1);
        let timings = scheduler.timings();
        assert_eq!(timings.len(), 1);
        assert!(!timings[0].active);
    }
}
