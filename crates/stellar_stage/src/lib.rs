//! # stellar_stage
//!
//! The per-tick work pipeline of one star system.
//!
//! A [`SimulationStage`] is a named unit of per-tick work; the
//! [`StageScheduler`] runs a system's registered stages in order once per
//! scheduler pass, sub-stepping large time deltas so no stage ever advances
//! by more than the stability threshold in one call.
//!
//! All state a stage touches arrives through the borrowed [`StageContext`] —
//! there is no ambient "current system" anywhere.

pub mod context;
pub mod scheduler;

pub use context::StageContext;
pub use scheduler::{STABLE_STEP, SimulationStage, StageScheduler, StageTiming};
