//! Task kinds: the closed set of things a creature can be asked to do.

use colony_events::{EventKind, GridPoint};
use std::collections::VecDeque;
use tracing::{debug, warn};

use super::{RequiredSkill, Skill, Task, TaskContext, TaskFailure, TaskOutcome};
use crate::clock::Deadline;
use crate::creatures::MAX_ENERGY;
use crate::destroy::Doomed;
use crate::grid::{CellId, Coordinates};
use crate::pathfinding::{PathHandle, PathPoll, PathRequest, PathResult};
use crate::structures::StructureId;

#[derive(Debug, Clone)]
pub enum TaskKind {
    MoveTo(MoveTo),
    Wait(Wait),
    Rest(Rest),
    /// Container for synthesized filler work; done once its subtasks are.
    Idle,
    Build(Build),
    Remove(Remove),
}

impl TaskKind {
    pub fn required_skill(&self) -> Option<RequiredSkill> {
        match self {
            TaskKind::Build(_) | TaskKind::Remove(_) => Some(RequiredSkill::new(Skill::Build, 1)),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::MoveTo(_) => "move_to",
            TaskKind::Wait(_) => "wait",
            TaskKind::Rest(_) => "rest",
            TaskKind::Idle => "idle",
            TaskKind::Build(_) => "build",
            TaskKind::Remove(_) => "remove",
        }
    }

    /// Runs the kind's own logic. May push subtasks, which run first from
    /// the next step on.
    pub(super) fn update(&mut self, subtasks: &mut VecDeque<Task>, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        match self {
            TaskKind::MoveTo(m) => m.update(ctx),
            TaskKind::Wait(w) => w.update(ctx),
            TaskKind::Rest(r) => r.update(ctx),
            TaskKind::Idle => TaskOutcome::Done,
            TaskKind::Build(b) => b.update(subtasks, ctx),
            TaskKind::Remove(r) => r.update(subtasks, ctx),
        }
    }

    pub(super) fn finalize(&mut self, ctx: &mut TaskContext<'_>) {
        match self {
            TaskKind::Build(b) => b.finalize(ctx),
            TaskKind::Remove(r) => r.finalize(ctx),
            _ => {}
        }
    }

    /// Drops whatever the previous owner's run left behind.
    pub(super) fn reset(&mut self) {
        match self {
            TaskKind::MoveTo(m) => m.reset(),
            TaskKind::Wait(w) => w.deadline = None,
            TaskKind::Rest(r) => r.deadline = None,
            TaskKind::Remove(r) => r.deconstructed = false,
            TaskKind::Idle | TaskKind::Build(_) => {}
        }
    }
}

fn grid_point(at: Coordinates) -> GridPoint {
    GridPoint::new(at.x, at.y)
}

/// Walk to a cell along a route fetched from the path queue.
#[derive(Debug, Clone)]
pub struct MoveTo {
    target: Option<CellId>,
    /// Remaining hops, excluding the cell the creature stands on.
    route: VecDeque<CellId>,
    pending: Option<PathHandle>,
    unreachable: u32,
    progress: f32,
}

impl MoveTo {
    pub fn new(target: CellId) -> Self {
        Self {
            target: Some(target),
            route: VecDeque::new(),
            pending: None,
            unreachable: 0,
            progress: 0.0,
        }
    }

    pub fn target(&self) -> Option<CellId> {
        self.target
    }

    /// Drops the target; any in-flight route is discarded.
    pub fn abandon(&mut self) {
        self.target = None;
        self.pending = None;
        self.route.clear();
    }

    pub fn unreachable_attempts(&self) -> u32 {
        self.unreachable
    }

    fn reset(&mut self) {
        self.route.clear();
        self.pending = None;
        self.unreachable = 0;
        self.progress = 0.0;
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let Some(target) = self.target else {
            return TaskOutcome::Done;
        };
        if ctx.creature.cell == target {
            return TaskOutcome::Done;
        }

        if let Some(handle) = &self.pending {
            let request = *handle.request();
            let PathPoll::Ready(result) = handle.poll() else {
                return TaskOutcome::InProgress;
            };
            self.pending = None;
            if request.to == target && request.from == ctx.creature.cell {
                match result {
                    PathResult::Found(path) => {
                        self.route = path.cells.into_iter().skip(1).collect();
                        self.progress = 0.0;
                    }
                    PathResult::Unreachable => return self.record_unreachable(target, ctx),
                }
            } else {
                debug!(creature = ctx.creature.id.0, "discarding stale route");
            }
        }

        if self.route.is_empty() {
            let request = PathRequest::new(ctx.creature.cell, target, ctx.creature.mobility);
            self.pending = Some(ctx.paths.submit(request));
            return TaskOutcome::InProgress;
        }

        self.walk(target, ctx)
    }

    fn record_unreachable(&mut self, target: CellId, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        self.unreachable += 1;
        let (from, to) = match ctx.grid.read() {
            Ok(grid) => (
                grid.coordinates(ctx.creature.cell).unwrap_or(ctx.creature.position),
                grid.coordinates(target).unwrap_or(ctx.creature.position),
            ),
            Err(err) => return TaskOutcome::Failed(TaskFailure::Grid(err.to_string())),
        };
        ctx.events.notify(
            ctx.clock.now(),
            Some(ctx.creature.snapshot()),
            EventKind::PathUnreachable {
                from: grid_point(from),
                to: grid_point(to),
                attempts: self.unreachable,
            },
        );
        if self.unreachable >= ctx.config.pathfinding.max_unreachable_attempts {
            return TaskOutcome::Failed(TaskFailure::Unreachable {
                attempts: self.unreachable,
            });
        }
        TaskOutcome::InProgress
    }

    /// Spends this tick's movement budget along the cached route.
    fn walk(&mut self, target: CellId, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let grid = match ctx.grid.read() {
            Ok(grid) => grid,
            Err(err) => return TaskOutcome::Failed(TaskFailure::Grid(err.to_string())),
        };
        let budget = ctx.creature.speed.min(ctx.config.tasks.max_move_speed);
        self.progress += budget;

        while let Some(&next) = self.route.front() {
            let cost = grid.traversal_cost(next, ctx.creature.mobility);
            let adjacent = grid.neighbors(ctx.creature.cell).any(|n| n == next);
            if cost < 0.0 || !adjacent {
                // Replan from wherever we stand on the next tick
                self.route.clear();
                self.progress = 0.0;
                return TaskOutcome::InProgress;
            }
            if self.progress < cost {
                // Saves up across ticks until the hop is affordable
                self.progress = self.progress.min(budget.max(cost));
                return TaskOutcome::InProgress;
            }
            self.progress -= cost;
            self.route.pop_front();

            let from = ctx.creature.cell;
            let at = grid.coordinates(next).unwrap_or(ctx.creature.position);
            ctx.creature.place(next, at);
            ctx.occupancy.relocate(from, next);

            if next == target {
                self.progress = 0.0;
                return TaskOutcome::Done;
            }
        }
        self.progress = 0.0;
        TaskOutcome::InProgress
    }
}

/// Do nothing until a number of in-game minutes has passed.
#[derive(Debug, Clone)]
pub struct Wait {
    pub reason: String,
    pub minutes: u64,
    deadline: Option<Deadline>,
}

impl Wait {
    pub fn new(reason: impl Into<String>, minutes: u64) -> Self {
        Self {
            reason: reason.into(),
            minutes,
            deadline: None,
        }
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let minutes = self.minutes;
        let deadline = *self
            .deadline
            .get_or_insert_with(|| ctx.clock.deadline_after(minutes));
        if ctx.clock.has_passed(deadline) {
            TaskOutcome::Done
        } else {
            TaskOutcome::InProgress
        }
    }
}

/// Sleep in place, restoring energy.
#[derive(Debug, Clone)]
pub struct Rest {
    pub minutes: u64,
    deadline: Option<Deadline>,
}

impl Rest {
    pub fn new(minutes: u64) -> Self {
        Self {
            minutes,
            deadline: None,
        }
    }

    fn update(&mut self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let minutes = self.minutes;
        let deadline = *self
            .deadline
            .get_or_insert_with(|| ctx.clock.deadline_after(minutes));

        let needs = &mut ctx.creature.needs;
        needs.energy = (needs.energy + ctx.config.tasks.rest_energy_per_tick).min(MAX_ENERGY);
        if needs.energy >= MAX_ENERGY || ctx.clock.has_passed(deadline) {
            TaskOutcome::Done
        } else {
            TaskOutcome::InProgress
        }
    }
}

/// Raise a blueprint into a structure.
#[derive(Debug, Clone)]
pub struct Build {
    pub blueprint: StructureId,
}

impl Build {
    pub fn new(blueprint: StructureId) -> Self {
        Self { blueprint }
    }

    fn update(&mut self, subtasks: &mut VecDeque<Task>, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let Some(site) = ctx.structures.blueprint(self.blueprint).map(|b| b.cell) else {
            return TaskOutcome::Failed(TaskFailure::TargetGone);
        };
        if let Some(outcome) = approach(site, subtasks, ctx) {
            return outcome;
        }

        if ctx.occupancy.count(site) > 0 {
            return TaskOutcome::Suspended;
        }

        let level = ctx.creature.skill_level(Skill::Build).max(1);
        let work = level as f32 * ctx.config.tasks.build_work_per_level;
        match ctx.structures.blueprint_mut(self.blueprint) {
            Some(blueprint) => {
                blueprint.work_done += work;
                if blueprint.is_complete() {
                    TaskOutcome::Done
                } else {
                    TaskOutcome::InProgress
                }
            }
            None => TaskOutcome::Failed(TaskFailure::TargetGone),
        }
    }

    fn finalize(&mut self, ctx: &mut TaskContext<'_>) {
        let mut grid = match ctx.grid.write() {
            Ok(grid) => grid,
            Err(err) => {
                warn!(%err, blueprint = self.blueprint.0, "cannot complete structure");
                return;
            }
        };
        let completed = match ctx.structures.complete(&mut grid, self.blueprint) {
            Ok(Some(structure)) => Some((structure.name.clone(), structure.cell)),
            Ok(None) => None,
            Err(err) => {
                warn!(%err, blueprint = self.blueprint.0, "cannot complete structure");
                None
            }
        };
        let Some((name, cell)) = completed else {
            return;
        };
        let at = grid.coordinates(cell).unwrap_or(ctx.creature.position);
        drop(grid);
        ctx.events.notify(
            ctx.clock.now(),
            Some(ctx.creature.snapshot()),
            EventKind::StructureCompleted {
                structure: name,
                at: grid_point(at),
            },
        );
    }
}

/// Tear down a standing structure.
#[derive(Debug, Clone)]
pub struct Remove {
    pub structure: StructureId,
    deconstructed: bool,
}

impl Remove {
    pub fn new(structure: StructureId) -> Self {
        Self {
            structure,
            deconstructed: false,
        }
    }

    fn update(&mut self, subtasks: &mut VecDeque<Task>, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let Some(site) = ctx.structures.structure(self.structure).map(|s| s.cell) else {
            return TaskOutcome::Failed(TaskFailure::TargetGone);
        };
        if let Some(outcome) = approach(site, subtasks, ctx) {
            return outcome;
        }
        if !self.deconstructed {
            self.deconstructed = true;
            let minutes = ctx.config.tasks.removal_minutes;
            subtasks.push_back(Task::spawned(TaskKind::Wait(Wait::new("deconstructing", minutes))));
            return TaskOutcome::InProgress;
        }
        TaskOutcome::Done
    }

    /// The structure itself goes at the end of the tick.
    fn finalize(&mut self, ctx: &mut TaskContext<'_>) {
        ctx.destroy.queue(Doomed::Structure(self.structure));
    }
}

/// Queues a walk to a pathable cell next to `site` unless the creature is
/// already beside it. `None` means in position.
fn approach(site: CellId, subtasks: &mut VecDeque<Task>, ctx: &mut TaskContext<'_>) -> Option<TaskOutcome> {
    let grid = match ctx.grid.read() {
        Ok(grid) => grid,
        Err(err) => return Some(TaskOutcome::Failed(TaskFailure::Grid(err.to_string()))),
    };
    if grid.neighbors(ctx.creature.cell).any(|n| n == site) {
        return None;
    }
    let origin = ctx.creature.position;
    let stand = grid
        .neighbors(site)
        .filter(|n| grid.pathable(*n, ctx.creature.mobility))
        .min_by_key(|n| {
            grid.coordinates(*n)
                .map(|at| at.chebyshev(origin))
                .unwrap_or(u32::MAX)
        });
    Some(match stand {
        Some(stand) => {
            subtasks.push_back(Task::spawned(TaskKind::MoveTo(MoveTo::new(stand))));
            TaskOutcome::InProgress
        }
        None => TaskOutcome::Suspended,
    })
}
