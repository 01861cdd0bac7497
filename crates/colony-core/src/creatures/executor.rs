//! Agent Executor
//!
//! Drives every creature one step per tick: unassigned creatures take work
//! from their faction, assigned ones step their task and hand the result
//! back to the pool. A failed task never stops the loop.

use bevy_ecs::prelude::*;
use colony_events::EventKind;
use rand::rngs::SmallRng;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::{Creature, CreatureId, CreatureRegistry, Occupancy};
use crate::clock::SimClock;
use crate::config::SimConfig;
use crate::destroy::DestroyCache;
use crate::grid::SharedGrid;
use crate::notify::NotificationSink;
use crate::pathfinding::PathRequestQueue;
use crate::structures::StructureRegistry;
use crate::tasks::{Faction, FactionRegistry, PlanningContext, TaskContext, TaskFailure, TaskOutcome};

/// Where a creature stands in the execution cycle after its last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Unassigned,
    Executing,
    Done,
    Failed,
}

/// Shared services a tick needs, borrowed from the world.
pub struct TickServices<'a> {
    pub grid: &'a SharedGrid,
    pub paths: &'a mut PathRequestQueue,
    pub clock: &'a SimClock,
    pub rng: &'a mut SmallRng,
    pub structures: &'a mut StructureRegistry,
    pub destroy: &'a DestroyCache,
    pub events: &'a mut dyn NotificationSink,
    pub config: &'a SimConfig,
}

/// Counts of what happened during one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub assigned: usize,
    pub completed: usize,
    pub failed: usize,
    pub suspended: usize,
}

/// Resource remembering each creature's last executor state.
#[derive(Resource, Debug, Default)]
pub struct AgentExecutor {
    states: BTreeMap<CreatureId, ExecutorState>,
}

impl AgentExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_of(&self, id: CreatureId) -> ExecutorState {
        self.states
            .get(&id)
            .copied()
            .unwrap_or(ExecutorState::Unassigned)
    }

    /// Steps every live creature that is not fighting, in id order.
    pub fn tick(
        &mut self,
        creatures: &mut CreatureRegistry,
        factions: &mut FactionRegistry,
        services: &mut TickServices<'_>,
    ) -> TickReport {
        let mut occupancy = creatures.occupancy();
        let mut report = TickReport::default();
        self.states.retain(|id, _| creatures.get(*id).is_some());

        for creature in creatures.iter_mut() {
            if !creature.alive || creature.in_combat() {
                continue;
            }
            let Some(faction) = factions.get_mut(creature.faction) else {
                warn!(creature = creature.id.0, faction = %creature.faction, "creature has no faction");
                continue;
            };
            let state = step_creature(creature, faction, &mut occupancy, services, &mut report);
            self.states.insert(creature.id, state);
        }
        report
    }
}

fn step_creature(
    creature: &mut Creature,
    faction: &mut Faction,
    occupancy: &mut Occupancy,
    services: &mut TickServices<'_>,
    report: &mut TickReport,
) -> ExecutorState {
    let Some(task_id) = creature.task else {
        let grid = match services.grid.read() {
            Ok(grid) => grid,
            Err(err) => {
                warn!(%err, "cannot plan without the grid");
                return ExecutorState::Unassigned;
            }
        };
        let mut planning = PlanningContext {
            grid: &grid,
            occupancy,
            clock: services.clock,
            rng: &mut *services.rng,
            config: services.config,
        };
        let task_id = faction.take_task(creature, &mut planning);
        drop(grid);
        creature.task = Some(task_id);
        report.assigned += 1;

        if let Some(record) = faction.assigned(task_id) {
            debug!(creature = creature.id.0, task = %task_id, kind = record.task.label(), "task assigned");
            services.events.notify(
                services.clock.now(),
                Some(creature.snapshot()),
                EventKind::TaskAssigned {
                    task: task_id.to_string(),
                    task_kind: record.task.label().to_string(),
                    origin: record.origin.to_string(),
                },
            );
        }
        return ExecutorState::Executing;
    };

    let Some(record) = faction.assigned_mut(task_id) else {
        debug!(creature = creature.id.0, task = %task_id, "task vanished from the pool");
        creature.task = None;
        return ExecutorState::Unassigned;
    };

    let was_suspended = record.task.is_suspended();
    let mut ctx = TaskContext {
        creature: &mut *creature,
        grid: services.grid,
        paths: &mut *services.paths,
        clock: services.clock,
        rng: &mut *services.rng,
        structures: &mut *services.structures,
        occupancy: &mut *occupancy,
        destroy: services.destroy,
        events: &mut *services.events,
        config: services.config,
    };
    let outcome = record.task.step(&mut ctx);
    if outcome == TaskOutcome::Done {
        record.task.finalize(&mut ctx);
    }
    let label = record.task.label();

    match outcome {
        TaskOutcome::InProgress => ExecutorState::Executing,
        TaskOutcome::Suspended => {
            if !was_suspended {
                report.suspended += 1;
                debug!(creature = creature.id.0, task = %task_id, "task suspended");
                services.events.notify(
                    services.clock.now(),
                    Some(creature.snapshot()),
                    EventKind::TaskSuspended {
                        task: task_id.to_string(),
                        task_kind: label.to_string(),
                    },
                );
            }
            ExecutorState::Executing
        }
        TaskOutcome::Done => {
            faction.remove_task(task_id);
            creature.task = None;
            report.completed += 1;
            debug!(creature = creature.id.0, task = %task_id, kind = label, "task done");
            services.events.notify(
                services.clock.now(),
                Some(creature.snapshot()),
                EventKind::TaskCompleted {
                    task: task_id.to_string(),
                    task_kind: label.to_string(),
                },
            );
            ExecutorState::Done
        }
        TaskOutcome::Failed(reason) => {
            fail(creature, faction, occupancy, services, task_id, label, reason);
            report.failed += 1;
            ExecutorState::Failed
        }
    }
}

fn fail(
    creature: &mut Creature,
    faction: &mut Faction,
    occupancy: &mut Occupancy,
    services: &mut TickServices<'_>,
    task_id: crate::tasks::TaskId,
    label: &'static str,
    reason: TaskFailure,
) {
    warn!(creature = creature.id.0, task = %task_id, kind = label, %reason, "task failed");
    services.events.notify(
        services.clock.now(),
        Some(creature.snapshot()),
        EventKind::TaskFailed {
            task: task_id.to_string(),
            task_kind: label.to_string(),
            reason: reason.to_string(),
        },
    );
    faction.task_failed(task_id, reason, services.clock.now());
    creature.task = None;

    // A creature left standing on ground that became impassable is moved
    // to the nearest open cell
    let Ok(grid) = services.grid.read() else {
        return;
    };
    if grid.pathable(creature.cell, creature.mobility) {
        return;
    }
    let radius = services.config.tasks.unstuck_radius;
    if let Some(free) = grid.nearest_pathable(creature.cell, creature.mobility, radius) {
        if let Some(at) = grid.coordinates(free) {
            info!(creature = creature.id.0, x = at.x, y = at.y, "unstuck");
            occupancy.relocate(creature.cell, free);
            creature.place(free, at);
        }
    }
}
