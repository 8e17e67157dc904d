//! Daily colony growth.

use stellar_component::ColonyComponent;
use stellar_stage::{SimulationStage, StageContext};

const SECONDS_PER_DAY: u64 = 86_400;

/// Grows colony populations once per simulated day. Colony state is
/// simulation-internal and never mirrored into a shadow.
#[derive(Debug, Default)]
pub struct ColonyStage {
    next_run: u64,
}

impl SimulationStage for ColonyStage {
    fn name(&self) -> &'static str {
        "colony"
    }

    fn is_active(&self, ctx: &StageContext<'_>) -> bool {
        ctx.time >= self.next_run
    }

    fn update(&mut self, ctx: &mut StageContext<'_>, _delta: u32) {
        self.next_run = ctx.time + SECONDS_PER_DAY;
        let handles: Vec<_> = ctx.store.entities().collect();
        for handle in handles {
            if let Some(colony) = ctx.store.get_mut::<ColonyComponent>(handle) {
                let growth = colony.population / 1_000 + u64::from(colony.infrastructure);
                colony.population += growth;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stellar_component::{ComponentStore, SystemId, UuidTable};

    #[test]
    fn test_daily_growth_leaves_change_log_clean() {
        let mut store = ComponentStore::new();
        let mut ids = UuidTable::new(SystemId(0));
        let colony = store.create();
        store.insert(
            colony,
            ColonyComponent {
                population: 10_000,
                infrastructure: 5,
            },
        );
        let _ = store.take_changes();

        let mut stage = ColonyStage::default();
        let mut ctx = StageContext {
            store: &mut store,
            ids: &mut ids,
            system_id: SystemId(0),
            time: 0,
            tick: 1,
        };
        stage.update(&mut ctx, 1);
        assert_eq!(
            ctx.store.get::<ColonyComponent>(colony).unwrap().population,
            10_015
        );
        // Colony state is not synchronized; the shadow never hears of it.
        assert!(ctx.store.changes().is_empty());
        ctx.time = SECONDS_PER_DAY - 1;
        assert!(!stage.is_active(&ctx));
        ctx.time = SECONDS_PER_DAY;
        assert!(stage.is_active(&ctx));
    }
}
