//! Thrust and velocity integration.

use stellar_component::{MassComponent, MovementComponent, ThrustComponent};
use stellar_stage::{SimulationStage, StageContext};

/// Integrates thrust into velocity and velocity into position. Runs every
/// pass; the scheduler's sub-stepping keeps `delta` small enough for the
/// Euler step to stay sane.
#[derive(Debug, Default)]
pub struct MovementStage;

impl SimulationStage for MovementStage {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn update(&mut self, ctx: &mut StageContext<'_>, delta: u32) {
        let dt = f64::from(delta);
        let handles: Vec<_> = ctx.store.entities().collect();
        for handle in handles {
            let acceleration = match (
                ctx.store.get::<ThrustComponent>(handle),
                ctx.store.get::<MassComponent>(handle),
            ) {
                (Some(thrust), Some(mass)) if mass.kg > 0.0 => {
                    [thrust.thrust[0] / mass.kg, thrust.thrust[1] / mass.kg]
                }
                _ => [0.0; 2],
            };
            let Some(movement) = ctx.store.get::<MovementComponent>(handle) else {
                continue;
            };
            if acceleration == [0.0; 2] && movement.velocity == [0.0; 2] {
                continue; // parked; don't dirty the change log
            }
            if let Some(movement) = ctx.store.get_mut::<MovementComponent>(handle) {
                movement.velocity[0] += acceleration[0] * dt;
                movement.velocity[1] += acceleration[1] * dt;
                movement.position[0] += (movement.velocity[0] * dt) as i64;
                movement.position[1] += (movement.velocity[1] * dt) as i64;
            }
        }
    }
}
