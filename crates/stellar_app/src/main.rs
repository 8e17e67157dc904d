//! Seeds a two-system demo galaxy, lets it run at increasing speed for a
//! few seconds while reporting shadow observations, then shuts down.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stellar_component::{
    ColonyComponent, EmpireId, EntityReference, MassComponent, MovementComponent, NameComponent,
    OrbitComponent, SystemId, ThrustComponent,
};
use stellar_galaxy::{
    Command, Empire, Galaxy, GalaxyConfig, Player, StarSystem,
    stages::{ColonyStage, MovementStage, OrbitStage},
};

const TERRANS: EmpireId = EmpireId(0);

/// Sol: a sun, a colonised planet, its moon, and three ships. Returns the
/// system plus durable references to the flagship and the colony.
fn seed_sol() -> Result<(StarSystem, EntityReference, EntityReference)> {
    let mut sol = StarSystem::new(SystemId(0), "Sol");

    let sun = sol.create_entity(TERRANS);
    sol.store_mut().insert(sun, NameComponent::new("Sol"));
    sol.store_mut().insert(sun, MovementComponent::default());
    sol.store_mut().insert(sun, MassComponent { kg: 1.989e30 });

    let planet = sol.create_entity(TERRANS);
    sol.store_mut().insert(planet, NameComponent::new("Terra"));
    sol.store_mut().insert(
        planet,
        OrbitComponent {
            parent: sun,
            radius_m: 149_597_870_700,
            period_s: 31_557_600,
            phase_deg: 0.0,
        },
    );
    sol.store_mut().insert(
        planet,
        ColonyComponent {
            population: 10_000_000,
            infrastructure: 250,
        },
    );

    let moon = sol.create_entity(TERRANS);
    sol.store_mut().insert(moon, NameComponent::new("Luna"));
    sol.store_mut().insert(
        moon,
        OrbitComponent {
            parent: planet,
            radius_m: 384_400_000,
            period_s: 2_360_592,
            phase_deg: 90.0,
        },
    );

    let mut flagship = None;
    for (index, name) in ["Venture", "Pathfinder", "Herald"].iter().enumerate() {
        let ship = sol.create_entity(TERRANS);
        sol.store_mut().insert(ship, NameComponent::new(*name));
        sol.store_mut().insert(
            ship,
            MovementComponent {
                position: [150_000_000_000 + index as i64 * 1_000_000, 0],
                velocity: [0.0; 2],
            },
        );
        sol.store_mut()
            .insert(ship, ThrustComponent { thrust: [120_000.0, 0.0] });
        sol.store_mut().insert(ship, MassComponent { kg: 12_000.0 });
        if flagship.is_none() {
            flagship = sol.entity_reference(ship);
        }
    }

    sol.attach_stage(MovementStage);
    sol.attach_stage(OrbitStage::default());
    sol.attach_stage(ColonyStage::default());

    let flagship = flagship.context("flagship reference missing after seeding")?;
    let colony = sol
        .entity_reference(planet)
        .context("colony reference missing after seeding")?;
    Ok((sol, flagship, colony))
}

fn seed_centauri() -> StarSystem {
    let mut centauri = StarSystem::new(SystemId(1), "Alpha Centauri");

    let star = centauri.create_entity(TERRANS);
    centauri
        .store_mut()
        .insert(star, NameComponent::new("Rigil Kentaurus"));
    centauri
        .store_mut()
        .insert(star, MovementComponent::default());
    centauri
        .store_mut()
        .insert(star, MassComponent { kg: 2.188e30 });

    let scout = centauri.create_entity(TERRANS);
    centauri
        .store_mut()
        .insert(scout, NameComponent::new("Far Scout"));
    centauri.store_mut().insert(
        scout,
        MovementComponent {
            position: [200_000_000_000, 0],
            velocity: [0.0, 1_500.0],
        },
    );

    centauri.attach_stage(MovementStage);
    centauri.attach_stage(OrbitStage::default());

    centauri
}

fn report(galaxy: &Galaxy) {
    let shadow = galaxy.shadow();
    info!(
        tick = shadow.galaxy.tick,
        sim_time = shadow.galaxy.sim_time,
        day = shadow.galaxy.day,
        speed_ns = shadow.galaxy.speed_ns,
        speed_limited = shadow.galaxy.speed_limited,
        "galaxy state"
    );
    for stats in &shadow.galaxy.stats {
        info!(
            system = %stats.system_id,
            name = %stats.name,
            entities = stats.entities,
            added = stats.added,
            changed = stats.changed,
            deleted = stats.deleted,
            update_us = stats.update.as_micros() as u64,
            "system state"
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (sol, flagship, colony) = seed_sol()?;
    let mut terrans = Empire::new(TERRANS, "Terran Federation");
    terrans.funds = 1_000_000;
    terrans.add_colony(colony);
    let mut galaxy = Galaxy::builder()
        .config(GalaxyConfig::default())
        .system(sol)
        .system(seed_centauri())
        .empire(terrans)
        .player(Player::new("admiral", TERRANS))
        .start();

    galaxy.queue_command(
        TERRANS,
        Command::Rename {
            target: flagship,
            name: "TFS Venture".to_string(),
        },
    )?;
    galaxy.queue_command(
        TERRANS,
        Command::SetThrust {
            target: flagship,
            thrust: [0.0, 240_000.0],
        },
    )?;

    for round in 0..5u32 {
        thread::sleep(Duration::from_millis(600));
        report(&galaxy);
        if round < 4 {
            galaxy.increase_speed(0);
        }
    }

    let shadow = galaxy.shadow();
    if let Some(resolved) = shadow.resolve(&flagship)
        && let Some(sol_shadow) = shadow.system(flagship.system_id)
    {
        let name = sol_shadow
            .get::<NameComponent>(resolved.handle)
            .map_or("<unnamed>", |component| component.name.as_str());
        info!(uuid = %resolved.uuid, name, "flagship resolved from shadow");
    }
    drop(shadow);

    galaxy.shutdown();
    Ok(())
}
