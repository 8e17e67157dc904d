//! The star-system worker pool.
//!
//! Workers partition the schedule through a monotonic atomic claim counter:
//! each slot is claimed by exactly one worker exactly once per tick, workers
//! that finish early immediately claim more work, and the last finisher
//! stops claiming so the pool goes back to sleep until the driver bumps the
//! work generation again.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{debug, error};

use crate::galaxy::GalaxyCore;
use crate::lock;

pub(crate) fn worker_loop(core: Arc<GalaxyCore>, worker_id: usize) {
    debug!(worker_id, "worker started");
    let mut seen_generation = 0u64;
    loop {
        {
            let mut generation = lock::lock(&core.work_generation);
            while *generation == seen_generation && !core.shutdown.load(Ordering::Acquire) {
                generation = lock::wait(&core.work_available, generation);
            }
            seen_generation = *generation;
        }
        if core.shutdown.load(Ordering::Acquire) {
            debug!(worker_id, "worker stopping");
            return;
        }
        run_claimed(&core);
    }
}

fn run_claimed(core: &GalaxyCore) {
    let schedule = lock::read(&core.schedule);
    let count = schedule.len();
    let mut slot = core.taken.fetch_add(1, Ordering::AcqRel);
    while slot < count {
        update_system(core, schedule[slot]);
        // Incremented even after a failed update so the driver's barrier
        // always closes.
        if core.completed.fetch_add(1, Ordering::AcqRel) + 1 == count {
            break; // last finisher; the driver owns the tick from here
        }
        slot = core.taken.fetch_add(1, Ordering::AcqRel);
    }
}

fn update_system(core: &GalaxyCore, index: usize) {
    let tick = core.tick.load(Ordering::Acquire);
    let delta = core.tick_size.load(Ordering::Acquire);
    let time = core.sim_time.load(Ordering::Acquire) - u64::from(delta);
    let cell = &core.systems[index];

    // Lock order: shadow before the system mutex, matching the publish step.
    let shadow = lock::read(&core.shadow);
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut system = lock::lock(&cell.live);
        system.update(tick, time, delta, &shadow.systems[index]);
    }));
    cell.last_update_ns
        .store(start.elapsed().as_nanos() as u64, Ordering::Relaxed);

    if let Err(payload) = outcome {
        let message = panic_message(payload.as_ref());
        error!(
            system = index,
            tick,
            panic = %message,
            "star system update panicked; pausing simulation"
        );
        core.speed_ns.store(0, Ordering::Release);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
