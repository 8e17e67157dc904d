//! Circular orbit positioning on a fixed cadence.

use std::f64::consts::TAU;

use stellar_component::{MovementComponent, OrbitComponent};
use stellar_stage::{SimulationStage, StageContext};

const ORBIT_INTERVAL: u64 = 60;

/// Repositions orbiting bodies once per simulated minute from their
/// [`OrbitComponent`] parameters. Position-only; orbital velocity is not
/// modelled.
#[derive(Debug, Default)]
pub struct OrbitStage {
    next_run: u64,
}

impl SimulationStage for OrbitStage {
    fn name(&self) -> &'static str {
        "orbit"
    }

    fn is_active(&self, ctx: &StageContext<'_>) -> bool {
        ctx.time >= self.next_run
    }

    fn update(&mut self, ctx: &mut StageContext<'_>, _delta: u32) {
        self.next_run = ctx.time + ORBIT_INTERVAL;
        let handles: Vec<_> = ctx.store.entities().collect();
        for handle in handles {
            let Some(orbit) = ctx.store.get::<OrbitComponent>(handle).copied() else {
                continue;
            };
            if orbit.period_s == 0 {
                continue;
            }
            let center = ctx
                .store
                .get::<MovementComponent>(orbit.parent)
                .map_or([0, 0], |movement| movement.position);
            let angle = orbit.phase_deg.to_radians()
                + TAU * ((ctx.time % orbit.period_s) as f64) / (orbit.period_s as f64);
            let radius = orbit.radius_m as f64;
            let position = [
                center[0] + (radius * angle.cos()) as i64,
                center[1] + (radius * angle.sin()) as i64,
            ];
            if let Some(movement) = ctx.store.get_mut::<MovementComponent>(handle) {
                movement.position = position;
            } else {
                ctx.store.insert(
                    handle,
                    MovementComponent {
                        position,
                        velocity: [0.0; 2],
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stellar_component::{ComponentStore, SystemId, UuidTable};

    #[test]
    fn test_orbit_positions_relative_to_parent() {
        let mut store = ComponentStore::new();
        let mut ids = UuidTable::new(SystemId(0));
        let star = store.create();
        store.insert(
            star,
            MovementComponent {
                position: [1_000, 2_000],
                velocity: [0.0; 2],
            },
        );
        let planet = store.create();
        store.insert(
            planet,
            OrbitComponent {
                parent: star,
                radius_m: 500,
                period_s: 360,
                phase_deg: 0.0,
            },
        );
        let mut stage = OrbitStage::default();
        let mut ctx = StageContext {
            store: &mut store,
            ids: &mut ids,
            system_id: SystemId(0),
            time: 0,
            tick: 1,
        };
        assert!(stage.is_active(&ctx));
        stage.update(&mut ctx, 1);
        // Phase zero at time zero: offset straight along +x.
        let movement = store.get::<MovementComponent>(planet).unwrap();
        assert_eq!(movement.position, [1_500, 2_000]);
    }

    #[test]
    fn test_cadence_gate() {
        let mut store = ComponentStore::new();
        let mut ids = UuidTable::new(SystemId(0));
        let mut stage = OrbitStage::default();
        let mut ctx = StageContext {
            store: &mut store,
            ids: &mut ids,
            system_id: SystemId(0),
            time: 0,
            tick: 1,
        };
        stage.update(&mut ctx, 1);
        ctx.time = 30;
        assert!(!stage.is_active(&ctx));
        ctx.time = 60;
        assert!(stage.is_active(&ctx));
    }
}
