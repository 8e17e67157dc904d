//! Concrete simulation stages.

pub mod colony;
pub mod movement;
pub mod orbit;

pub use colony::ColonyStage;
pub use movement::MovementStage;
pub use orbit::OrbitStage;
