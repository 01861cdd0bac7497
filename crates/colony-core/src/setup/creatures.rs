//! Creature Spawning
//!
//! Settlers with randomized skills, grazing wildlife and a few raiders.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;

use super::factions::{RAIDERS, SETTLERS, WILDLIFE};
use super::SetupError;
use crate::config::SimConfig;
use crate::creatures::{Behaviour, Creature, CreatureRegistry};
use crate::grid::{CellId, GridTopology, Mobility};
use crate::tasks::{FactionId, Skill};

const SETTLER_NAMES: &[&str] = &[
    "Alder", "Bryn", "Cedar", "Elm", "Fern", "Hazel", "Holly", "Ivy", "Linden", "Maple", "Reed", "Rowan", "Sage",
    "Wren", "Finch", "Lark",
];

const RAIDER_NAMES: &[&str] = &["Crag", "Flint", "Brand", "Pike", "Ulf", "Orm", "Rune", "Sven"];

fn name_for(names: &[&str], index: usize) -> String {
    let base = names[index % names.len()];
    match index / names.len() {
        0 => base.to_string(),
        round => format!("{base} {}", round + 1),
    }
}

/// Spawns settlers, grazers and raiders on random walkable cells.
pub fn spawn_creatures(grid: &GridTopology, config: &SimConfig, rng: &mut SmallRng) -> Result<CreatureRegistry, SetupError> {
    let open: Vec<CellId> = grid
        .cells()
        .map(|c| c.id)
        .filter(|id| grid.pathable(*id, Mobility::Walk))
        .collect();
    if open.is_empty() {
        return Err(SetupError::NoOpenGround("creatures"));
    }

    let agents = &config.agents;
    let mut registry = CreatureRegistry::new();
    let spawn = |registry: &mut CreatureRegistry, rng: &mut SmallRng, name: String, faction: FactionId, behaviour: Behaviour| {
        let id = registry.allocate_id();
        let cell = open.choose(rng).copied().unwrap_or(open[0]);
        Creature::new(id, name, faction, grid, cell, behaviour)
    };

    for i in 0..agents.settlers {
        let mut settler = spawn(&mut registry, rng, name_for(SETTLER_NAMES, i), SETTLERS, Behaviour::Person);
        for skill in [Skill::Build, Skill::Haul, Skill::Mine, Skill::Cook] {
            // Zero leaves the skill untrained
            let level = rng.gen_range(0..=8u8);
            if level > 0 {
                settler = settler.with_skill(skill, level);
            }
        }
        settler.combat.aggression = config.combat.default_aggression;
        registry.insert(settler);
    }

    for i in 0..agents.grazers {
        let mut grazer = spawn(&mut registry, rng, format!("Grazer {}", i + 1), WILDLIFE, Behaviour::Grazer).with_speed(0.5);
        grazer.combat.aggression = config.combat.default_aggression * 0.5;
        registry.insert(grazer);
    }

    for i in 0..agents.raiders {
        let mut raider = spawn(&mut registry, rng, name_for(RAIDER_NAMES, i), RAIDERS, Behaviour::Grazer).with_speed(1.5);
        raider.combat.aggression = config.combat.default_aggression * 1.5;
        registry.insert(raider);
    }

    Ok(registry)
}
