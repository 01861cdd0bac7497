//! Creatures
//!
//! The id-indexed creature arena, per-cell occupancy, skills and needs.

mod behaviour;
pub mod executor;

pub use behaviour::Behaviour;
pub use executor::{AgentExecutor, ExecutorState, TickReport, TickServices};

use bevy_ecs::prelude::*;
use colony_events::{ActorSnapshot, GridPoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::combat::CombatState;
use crate::grid::{CellId, Coordinates, GridTopology, Mobility};
use crate::tasks::{FactionId, Skill, Task, TaskId};

/// Energy ceiling for `Needs::energy`.
pub const MAX_ENERGY: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreatureId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Needs {
    pub energy: f32,
}

impl Default for Needs {
    fn default() -> Self {
        Self { energy: MAX_ENERGY }
    }
}

#[derive(Debug, Clone)]
pub struct Creature {
    pub id: CreatureId,
    pub name: String,
    pub faction: FactionId,
    pub cell: CellId,
    pub position: Coordinates,
    pub mobility: Mobility,
    /// Cost units of movement per tick.
    pub speed: f32,
    pub skills: BTreeMap<Skill, u8>,
    pub behaviour: Behaviour,
    /// Task currently owned in the faction pool.
    pub task: Option<TaskId>,
    pub needs: Needs,
    pub combat: CombatState,
    pub alive: bool,
}

impl Creature {
    pub fn new(
        id: CreatureId,
        name: impl Into<String>,
        faction: FactionId,
        grid: &GridTopology,
        cell: CellId,
        behaviour: Behaviour,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            faction,
            cell,
            position: grid.coordinates(cell).unwrap_or(Coordinates::new(0, 0)),
            mobility: Mobility::Walk,
            speed: 1.0,
            skills: BTreeMap::new(),
            behaviour,
            task: None,
            needs: Needs::default(),
            combat: CombatState::default(),
            alive: true,
        }
    }

    pub fn with_skill(mut self, skill: Skill, level: u8) -> Self {
        self.skills.insert(skill, level);
        self
    }

    pub fn with_mobility(mut self, mobility: Mobility) -> Self {
        self.mobility = mobility;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn skill_level(&self, skill: Skill) -> u8 {
        self.skills.get(&skill).copied().unwrap_or(0)
    }

    /// True if the creature meets the task's requirement and, recursively,
    /// that of every declared subtask.
    pub fn can_do(&self, task: &Task) -> bool {
        let meets = task
            .required
            .map_or(true, |r| self.skill_level(r.skill) >= r.level);
        meets && task.subtasks.iter().all(|sub| self.can_do(sub))
    }

    /// Scheduling priority: the skill level for skilled tasks, `unskilled`
    /// for tasks with no requirement, zero when the skill is missing.
    pub fn priority(&self, task: &Task, unskilled: u32) -> u32 {
        match task.required {
            None => unskilled,
            Some(required) => self.skill_level(required.skill) as u32,
        }
    }

    pub fn place(&mut self, cell: CellId, position: Coordinates) {
        self.cell = cell;
        self.position = position;
    }

    pub fn in_combat(&self) -> bool {
        !self.combat.combatants.is_empty()
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot::new(
            self.id.0,
            self.name.clone(),
            self.faction.0,
            GridPoint::new(self.position.x, self.position.y),
        )
    }
}

/// Live creature count per cell.
#[derive(Debug, Default, Clone)]
pub struct Occupancy(BTreeMap<CellId, u32>);

impl Occupancy {
    pub fn from_creatures<'a>(creatures: impl Iterator<Item = &'a Creature>) -> Self {
        let mut occupancy = Self::default();
        for creature in creatures.filter(|c| c.alive) {
            occupancy.enter(creature.cell);
        }
        occupancy
    }

    pub fn count(&self, cell: CellId) -> u32 {
        self.0.get(&cell).copied().unwrap_or(0)
    }

    pub fn enter(&mut self, cell: CellId) {
        *self.0.entry(cell).or_insert(0) += 1;
    }

    pub fn leave(&mut self, cell: CellId) {
        if let Some(count) = self.0.get_mut(&cell) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.0.remove(&cell);
            }
        }
    }

    pub fn relocate(&mut self, from: CellId, to: CellId) {
        self.leave(from);
        self.enter(to);
    }
}

/// Resource holding every creature, by id.
#[derive(Resource, Debug, Default)]
pub struct CreatureRegistry {
    creatures: BTreeMap<CreatureId, Creature>,
    next_id: u64,
}

impl CreatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next unused id.
    pub fn allocate_id(&mut self) -> CreatureId {
        let id = CreatureId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, creature: Creature) {
        self.next_id = self.next_id.max(creature.id.0 + 1);
        self.creatures.insert(creature.id, creature);
    }

    pub fn remove(&mut self, id: CreatureId) -> Option<Creature> {
        self.creatures.remove(&id)
    }

    pub fn get(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    pub fn get_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.get_mut(&id)
    }

    pub fn is_alive(&self, id: CreatureId) -> bool {
        self.get(id).is_some_and(|c| c.alive)
    }

    pub fn ids(&self) -> Vec<CreatureId> {
        self.creatures.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Creature> {
        self.creatures.values_mut()
    }

    pub fn len(&self) -> usize {
        self.creatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creatures.is_empty()
    }

    pub fn occupancy(&self) -> Occupancy {
        Occupancy::from_creatures(self.iter())
    }
}
