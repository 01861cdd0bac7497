//! Behaviours: per-creature goal generation that runs before the faction
//! pool is consulted.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Creature;
use crate::tasks::{MoveTo, PlanningContext, Rest, Task, TaskKind, Wait};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behaviour {
    /// Rests when tired and steps off crowded cells; otherwise takes pool work.
    Person,
    /// Roams aimlessly; never takes pool work.
    Grazer,
    /// Always defers to the pool.
    Worker,
}

impl Behaviour {
    /// Proposes a task, or `None` to let the faction pool decide.
    pub fn propose(&self, creature: &Creature, ctx: &mut PlanningContext<'_>) -> Option<Task> {
        match self {
            Behaviour::Person => person(creature, ctx),
            Behaviour::Grazer => Some(grazer(creature, ctx)),
            Behaviour::Worker => None,
        }
    }
}

fn person(creature: &Creature, ctx: &mut PlanningContext<'_>) -> Option<Task> {
    if creature.needs.energy < ctx.config.agents.tired_threshold {
        return Some(Task::new(TaskKind::Rest(Rest::new(ctx.config.tasks.rest_minutes))));
    }

    if ctx.occupancy.count(creature.cell) > 1 {
        let free = ctx
            .grid
            .neighbors(creature.cell)
            .find(|n| ctx.grid.pathable(*n, creature.mobility) && ctx.occupancy.count(*n) == 0)?;
        return Some(Task::new(TaskKind::MoveTo(MoveTo::new(free))));
    }

    None
}

fn grazer(creature: &Creature, ctx: &mut PlanningContext<'_>) -> Task {
    let tuning = &ctx.config.agents;
    if ctx.rng.gen_bool(tuning.roam_chance) {
        let spots: Vec<_> = ctx
            .grid
            .cells_within(creature.cell, tuning.roam_radius)
            .into_iter()
            .filter(|c| *c != creature.cell && ctx.grid.pathable(*c, creature.mobility))
            .collect();
        if let Some(spot) = spots.choose(&mut *ctx.rng) {
            return Task::new(TaskKind::MoveTo(MoveTo::new(*spot)));
        }
    }
    let minutes = ctx.rng.gen_range(30..=90);
    Task::new(TaskKind::Wait(Wait::new("lingering", minutes)))
}
