//! World Setup
//!
//! Map generation, faction creation, creature spawning and the assembly of
//! a ready-to-run ECS `World`.

pub mod creatures;
pub mod factions;
pub mod world;

pub use creatures::spawn_creatures;
pub use factions::{create_factions, RAIDERS, SETTLERS, WILDLIFE};
pub use world::{create_grid, place_blueprints, place_rubble};

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::info;

use crate::clock::SimClock;
use crate::combat::CombatDecisionEngine;
use crate::config::SimConfig;
use crate::creatures::AgentExecutor;
use crate::destroy::DestroyCache;
use crate::grid::{GridError, SharedGrid};
use crate::notify::EventLog;
use crate::pathfinding::PathRequestQueue;
use crate::structures::StructureRegistry;
use crate::systems::RunSummary;
use crate::SimRng;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no open ground left to place {0}")]
    NoOpenGround(&'static str),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("failed to start path worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Builds a world with every resource the schedule needs, seeded from
/// `config.simulation.seed`.
pub fn build_world(config: &SimConfig, log: EventLog) -> Result<World, SetupError> {
    let mut rng = SmallRng::seed_from_u64(config.simulation.seed);

    let mut grid = create_grid(&config.world, &mut rng);
    let mut structures = StructureRegistry::new();
    let factions = create_factions();
    let creatures = spawn_creatures(&grid, config, &mut rng)?;
    place_blueprints(&mut grid, &mut structures, &creatures, SETTLERS, config.agents.blueprints, &mut rng)?;
    place_rubble(&mut grid, &mut structures, &creatures, SETTLERS, config.agents.rubble, &mut rng)?;

    info!(
        width = grid.width(),
        height = grid.height(),
        creatures = creatures.len(),
        blueprints = config.agents.blueprints,
        rubble = config.agents.rubble,
        "world created"
    );

    let shared = SharedGrid::new(grid);
    let paths = PathRequestQueue::with_mode(config.pathfinding.worker, shared.clone(), config.pathfinding.heuristic)?;

    let mut world = World::new();
    world.insert_resource(config.clone());
    world.insert_resource(SimClock::new(config.simulation.minutes_per_tick));
    world.insert_resource(SimRng(rng));
    world.insert_resource(shared);
    world.insert_resource(paths);
    world.insert_resource(structures);
    world.insert_resource(factions);
    world.insert_resource(creatures);
    world.insert_resource(AgentExecutor::new());
    world.insert_resource(CombatDecisionEngine::new(&config.combat));
    world.insert_resource(DestroyCache::new());
    world.insert_resource(RunSummary::default());
    world.insert_resource(log);
    Ok(world)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creatures::CreatureRegistry;
    use crate::pathfinding::PathWorkerMode;
    use crate::tasks::FactionRegistry;

    fn small_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.world.width = 20;
        config.world.height = 12;
        config.pathfinding.worker = PathWorkerMode::Inline;
        config
    }

    #[test]
    fn test_build_world_inserts_resources() {
        let config = small_config();
        let world = build_world(&config, EventLog::in_memory()).unwrap();

        let expected = config.agents.settlers + config.agents.grazers + config.agents.raiders;
        assert_eq!(world.resource::<CreatureRegistry>().len(), expected);
        assert_eq!(world.resource::<FactionRegistry>().iter().count(), 3);
        assert_eq!(
            world.resource::<StructureRegistry>().blueprints_of(SETTLERS).count(),
            config.agents.blueprints
        );
        assert_eq!(
            world.resource::<StructureRegistry>().marked_for_removal_of(SETTLERS).count(),
            config.agents.rubble
        );
        assert_eq!(world.resource::<SimClock>().tick(), 0);
        assert_eq!(world.resource::<PathRequestQueue>().mode(), PathWorkerMode::Inline);
    }

    #[test]
    fn test_same_seed_same_world() {
        let config = small_config();
        let a = build_world(&config, EventLog::null()).unwrap();
        let b = build_world(&config, EventLog::null()).unwrap();

        let cells = |world: &World| -> Vec<_> { world.resource::<CreatureRegistry>().iter().map(|c| c.cell).collect() };
        assert_eq!(cells(&a), cells(&b));
    }
}
