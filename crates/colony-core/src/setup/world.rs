//! Map Setup
//!
//! Random terrain and the starting blueprints.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;

use super::SetupError;
use crate::config::WorldConfig;
use crate::creatures::CreatureRegistry;
use crate::grid::{CellId, GridTopology, Mobility, IMPASSABLE};
use crate::structures::StructureRegistry;
use crate::tasks::FactionId;

/// Blueprint name, travel cost once built, work needed.
const BLUEPRINTS: &[(&str, f32, f32)] = &[("wall", IMPASSABLE, 12.0), ("floor", 1.0, 6.0), ("bed", 2.0, 8.0)];

/// Rolls each cell as rock, rough ground or open ground.
pub fn create_grid(config: &WorldConfig, rng: &mut SmallRng) -> GridTopology {
    GridTopology::with_terrain(config.width, config.height, |_| {
        let roll: f64 = rng.gen();
        if roll < config.obstacle_density {
            IMPASSABLE
        } else if roll < config.obstacle_density + config.rough_density {
            config.rough_cost
        } else {
            1.0
        }
    })
}

/// Rubble travel cost while it stands.
const RUBBLE_COST: f32 = 4.0;

/// Open, unoccupied, walkable cells with nothing built on them.
fn open_ground(grid: &GridTopology, creatures: &CreatureRegistry) -> Vec<CellId> {
    let occupancy = creatures.occupancy();
    grid.cells()
        .filter(|c| c.structure.is_none() && c.terrain_cost == 1.0 && occupancy.count(c.id) == 0)
        .map(|c| c.id)
        .filter(|id| grid.pathable(*id, Mobility::Walk))
        .collect()
}

/// Places `count` blueprints for `faction` on open, unoccupied ground.
pub fn place_blueprints(
    grid: &mut GridTopology,
    structures: &mut StructureRegistry,
    creatures: &CreatureRegistry,
    faction: FactionId,
    count: usize,
    rng: &mut SmallRng,
) -> Result<(), SetupError> {
    let open = open_ground(grid, creatures);
    if open.len() < count {
        return Err(SetupError::NoOpenGround("blueprints"));
    }

    let sites: Vec<CellId> = open.choose_multiple(rng, count).copied().collect();
    for (i, cell) in sites.into_iter().enumerate() {
        let (name, travel_cost, work) = BLUEPRINTS[i % BLUEPRINTS.len()];
        structures.place_blueprint(grid, name, cell, faction, travel_cost, work)?;
    }
    Ok(())
}

/// Drops `count` rubble heaps owned by `faction`, each already marked for
/// removal so the faction raises work to clear it.
pub fn place_rubble(
    grid: &mut GridTopology,
    structures: &mut StructureRegistry,
    creatures: &CreatureRegistry,
    faction: FactionId,
    count: usize,
    rng: &mut SmallRng,
) -> Result<(), SetupError> {
    let open = open_ground(grid, creatures);
    if open.len() < count {
        return Err(SetupError::NoOpenGround("rubble"));
    }

    let sites: Vec<CellId> = open.choose_multiple(rng, count).copied().collect();
    for cell in sites {
        let id = structures.place_structure(grid, "rubble", cell, faction, RUBBLE_COST)?;
        structures.mark_for_removal(id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_densities_shape_terrain() {
        let mut rng = SmallRng::seed_from_u64(3);
        let config = WorldConfig {
            width: 10,
            height: 10,
            obstacle_density: 0.0,
            rough_density: 0.0,
            rough_cost: 3.0,
        };
        let grid = create_grid(&config, &mut rng);
        assert!(grid.cells().all(|c| c.terrain_cost == 1.0));

        let walled = WorldConfig {
            obstacle_density: 1.0,
            ..config
        };
        let grid = create_grid(&walled, &mut rng);
        assert!(grid.cells().all(|c| !grid.pathable(c.id, Mobility::Walk)));
    }

    #[test]
    fn test_blueprints_avoid_occupied_and_rough_cells() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut grid = GridTopology::with_terrain(4, 1, |c| if c.x == 3 { 3.0 } else { 1.0 });
        let mut structures = StructureRegistry::new();
        let creatures = CreatureRegistry::new();

        place_blueprints(&mut grid, &mut structures, &creatures, FactionId(0), 3, &mut rng).unwrap();
        assert_eq!(structures.blueprints_of(FactionId(0)).count(), 3);
        assert!(grid.cell(grid.cell_at(3, 0).unwrap()).unwrap().structure.is_none());

        let result = place_blueprints(&mut grid, &mut structures, &creatures, FactionId(0), 1, &mut rng);
        assert!(matches!(result, Err(SetupError::NoOpenGround(_))));
    }

    #[test]
    fn test_rubble_is_built_and_marked() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut grid = GridTopology::new(3, 3);
        let mut structures = StructureRegistry::new();
        let creatures = CreatureRegistry::new();

        place_rubble(&mut grid, &mut structures, &creatures, FactionId(0), 2, &mut rng).unwrap();
        let marked: Vec<_> = structures.marked_for_removal_of(FactionId(0)).collect();
        assert_eq!(marked.len(), 2);
        assert!(marked.iter().all(|s| s.name == "rubble"));
        assert_eq!(structures.blueprints_of(FactionId(0)).count(), 0);
        for s in marked {
            assert_eq!(grid.cell(s.cell).unwrap().travel_cost(), RUBBLE_COST);
        }
    }
}
