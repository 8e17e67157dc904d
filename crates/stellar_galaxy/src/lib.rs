//! # stellar_galaxy
//!
//! The concurrent heart of the simulation: a driver thread converts
//! wall-clock time into ticks at an adaptive rate, a worker pool partitions
//! the star systems through atomic claim counters, and a double-buffered
//! shadow per system lets UI and network threads read one consistent
//! whole-galaxy snapshot while the next tick is already being simulated.
//!
//! The publish step swaps every system's freshly built shadow with its
//! published one under a single write-lock acquisition; a reader holding the
//! read lock therefore never observes a torn mix of two ticks, even across
//! systems.

pub mod command;
pub mod empire;
pub mod galaxy;
pub mod shadow;
pub mod stages;
pub mod star_system;

mod lock;
mod worker;

pub use command::{Command, CommandError};
pub use empire::{Empire, Player, SPEED_STEPS, effective_speed};
pub use galaxy::{Galaxy, GalaxyBuilder, GalaxyConfig};
pub use shadow::{GalaxyShadow, ShadowGalaxy, ShadowStarSystem, SystemTickStats};
pub use star_system::StarSystem;
