//! Task Model
//!
//! Hierarchical units of creature work. A task is a closed `TaskKind` plus a
//! FIFO of subtasks that are drained depth-first before the task's own kind
//! runs. Stepping a task yields a `TaskOutcome` instead of unwinding.

mod kinds;
pub mod scheduler;

pub use kinds::{Build, MoveTo, Remove, Rest, TaskKind, Wait};
pub use scheduler::{Faction, FactionId, FactionRegistry, FailureRecord, PlanningContext, TaskRecord};

use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

use crate::clock::{Deadline, SimClock};
use crate::config::SimConfig;
use crate::creatures::{Creature, Occupancy};
use crate::destroy::DestroyCache;
use crate::grid::SharedGrid;
use crate::notify::NotificationSink;
use crate::pathfinding::PathRequestQueue;
use crate::structures::StructureRegistry;

/// Identifier of a task within its faction's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    pub faction: FactionId,
    pub seq: u32,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}#{}", self.faction.0, self.seq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Build,
    Mine,
    Haul,
    Cook,
}

/// Minimum skill level a creature needs to take a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredSkill {
    pub skill: Skill,
    pub level: u8,
}

impl RequiredSkill {
    pub fn new(skill: Skill, level: u8) -> Self {
        Self { skill, level }
    }
}

/// Why a task gave up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskFailure {
    #[error("no route to target after {attempts} attempts")]
    Unreachable { attempts: u32 },
    #[error("target is gone")]
    TargetGone,
    #[error("grid unavailable: {0}")]
    Grid(String),
    #[error("{0}")]
    Other(String),
}

/// Result of stepping a task for one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    InProgress,
    Done,
    /// Blocked on a condition; stays assigned but dormant.
    Suspended,
    Failed(TaskFailure),
}

/// Who raised a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    Faction,
    Behaviour,
    Idle,
}

impl fmt::Display for TaskOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOrigin::Faction => write!(f, "faction"),
            TaskOrigin::Behaviour => write!(f, "behaviour"),
            TaskOrigin::Idle => write!(f, "idle"),
        }
    }
}

/// Everything a task may touch while it runs, passed explicitly.
pub struct TaskContext<'a> {
    pub creature: &'a mut Creature,
    pub grid: &'a SharedGrid,
    pub paths: &'a mut PathRequestQueue,
    pub clock: &'a SimClock,
    pub rng: &'a mut SmallRng,
    pub structures: &'a mut StructureRegistry,
    pub occupancy: &'a mut Occupancy,
    pub destroy: &'a DestroyCache,
    pub events: &'a mut dyn NotificationSink,
    pub config: &'a SimConfig,
}

/// A unit of work with its pending subtasks.
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: TaskKind,
    pub required: Option<RequiredSkill>,
    pub subtasks: VecDeque<Task>,
    suspended_until: Option<Deadline>,
    /// Pushed by the parent's own kind while running, not declared up front.
    spawned: bool,
}

impl Task {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            required: kind.required_skill(),
            kind,
            subtasks: VecDeque::new(),
            suspended_until: None,
            spawned: false,
        }
    }

    fn spawned(kind: TaskKind) -> Self {
        Self {
            spawned: true,
            ..Self::new(kind)
        }
    }

    /// Overrides the skill requirement implied by the kind.
    pub fn with_required(mut self, required: Option<RequiredSkill>) -> Self {
        self.required = required;
        self
    }

    pub fn with_subtask(mut self, subtask: Task) -> Self {
        self.subtasks.push_back(subtask);
        self
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended_until.is_some()
    }

    /// Deadline after which a suspended task re-checks its condition.
    pub fn suspended_until(&self) -> Option<Deadline> {
        self.suspended_until
    }

    /// Wakes a suspended task so it re-checks on its next step.
    pub fn resume(&mut self) {
        self.suspended_until = None;
    }

    /// Returns the task to the state it was declared in, so its next owner
    /// starts over: run state is cleared all the way down and subtasks the
    /// kinds pushed for themselves are dropped.
    pub fn reset_progress(&mut self) {
        self.suspended_until = None;
        self.kind.reset();
        self.subtasks.retain(|sub| !sub.spawned);
        for sub in &mut self.subtasks {
            sub.reset_progress();
        }
    }

    /// Advances the task by one transition.
    ///
    /// The front subtask runs first; a finished subtask is finalized and
    /// popped, and a suspended or failed one propagates up unchanged. The
    /// task's own kind only runs once its subtask queue is empty.
    pub fn step(&mut self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        if let Some(until) = self.suspended_until {
            if !ctx.clock.has_passed(until) {
                return TaskOutcome::Suspended;
            }
            self.suspended_until = None;
        }

        let outcome = match self.subtasks.front_mut() {
            Some(front) => match front.step(ctx) {
                TaskOutcome::Done => {
                    front.finalize(ctx);
                    self.subtasks.pop_front();
                    TaskOutcome::InProgress
                }
                other => other,
            },
            None => self.kind.update(&mut self.subtasks, ctx),
        };

        if outcome == TaskOutcome::Suspended {
            self.suspended_until = Some(
                ctx.clock
                    .deadline_after(ctx.config.tasks.suspend_recheck_minutes),
            );
        }
        outcome
    }

    /// Runs once when the task reports done.
    pub fn finalize(&mut self, ctx: &mut TaskContext<'_>) {
        self.kind.finalize(ctx);
    }

    /// Label used in logs and events.
    pub fn label(&self) -> &'static str {
        self.kind.label()
    }
}
