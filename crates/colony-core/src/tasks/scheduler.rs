//! Task Scheduler
//!
//! Each faction owns a pool of tasks: `available` in insertion order and
//! `in_progress` keyed by id. Creatures hold only the id of the task they
//! run. Failed faction work goes to the back of the pool and sits out until
//! a periodic recycle pass clears its failure mark.

use bevy_ecs::prelude::*;
use colony_events::SimTimestamp;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

use super::{Build, MoveTo, Remove, Task, TaskFailure, TaskId, TaskKind, TaskOrigin, Wait};
use crate::clock::SimClock;
use crate::config::SimConfig;
use crate::creatures::{Creature, CreatureId, Occupancy};
use crate::grid::GridTopology;
use crate::structures::{StructureId, StructureRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactionId(pub u16);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction_{}", self.0)
    }
}

/// A task as the pool stores it.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task: Task,
    pub origin: TaskOrigin,
    pub owner: Option<CreatureId>,
    /// Set on failure; cleared by the recycle pass.
    pub failure: Option<TaskFailure>,
}

impl TaskRecord {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Audit log entry for a failed task.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRecord {
    pub task: TaskId,
    pub label: &'static str,
    pub owner: Option<CreatureId>,
    pub reason: TaskFailure,
    pub at: SimTimestamp,
}

/// Read-only view of the world handed to task selection.
pub struct PlanningContext<'a> {
    pub grid: &'a GridTopology,
    pub occupancy: &'a Occupancy,
    pub clock: &'a SimClock,
    pub rng: &'a mut SmallRng,
    pub config: &'a SimConfig,
}

/// What one periodic `Faction::update` changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FactionUpdate {
    pub raised: usize,
    pub retired: usize,
    pub recycled: usize,
    pub resumed: usize,
}

/// A faction and its task pool.
#[derive(Debug)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    hostile: BTreeSet<FactionId>,
    available: Vec<TaskRecord>,
    in_progress: BTreeMap<TaskId, TaskRecord>,
    failure_log: Vec<FailureRecord>,
    /// Build or removal task raised for each structure.
    site_tasks: BTreeMap<StructureId, TaskId>,
    next_seq: u32,
    last_recycle_hour: u64,
}

impl Faction {
    pub fn new(id: FactionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hostile: BTreeSet::new(),
            available: Vec::new(),
            in_progress: BTreeMap::new(),
            failure_log: Vec::new(),
            site_tasks: BTreeMap::new(),
            next_seq: 0,
            last_recycle_hour: 0,
        }
    }

    pub fn is_hostile(&self, other: FactionId) -> bool {
        self.hostile.contains(&other)
    }

    fn next_id(&mut self) -> TaskId {
        let id = TaskId {
            faction: self.id,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        id
    }

    /// Appends a task to the available pool.
    pub fn add_task(&mut self, task: Task, origin: TaskOrigin) -> TaskId {
        let id = self.next_id();
        self.available.push(TaskRecord {
            id,
            task,
            origin,
            owner: None,
            failure: None,
        });
        id
    }

    fn assign_new(&mut self, task: Task, origin: TaskOrigin, owner: CreatureId) -> TaskId {
        let id = self.next_id();
        self.in_progress.insert(
            id,
            TaskRecord {
                id,
                task,
                origin,
                owner: Some(owner),
                failure: None,
            },
        );
        id
    }

    /// Picks work for `creature` and moves it to in-progress.
    ///
    /// The creature's behaviour gets the first say. Otherwise the available
    /// pool is scanned in insertion order for the highest-priority task the
    /// creature can do; the earliest wins ties. Failing that, an idle task
    /// is synthesized.
    pub fn take_task(&mut self, creature: &Creature, ctx: &mut PlanningContext<'_>) -> TaskId {
        if let Some(task) = creature.behaviour.propose(creature, ctx) {
            return self.assign_new(task, TaskOrigin::Behaviour, creature.id);
        }

        let unskilled = ctx.config.scheduler.unskilled_priority;
        let mut best: Option<(usize, u32)> = None;
        for (index, record) in self.available.iter().enumerate() {
            if record.is_failed() || record.task.is_suspended() {
                continue;
            }
            let priority = creature.priority(&record.task, unskilled);
            if priority == 0 || !creature.can_do(&record.task) {
                continue;
            }
            if best.map_or(true, |(_, top)| priority > top) {
                best = Some((index, priority));
            }
        }

        if let Some((index, priority)) = best {
            let mut record = self.available.remove(index);
            record.owner = Some(creature.id);
            let id = record.id;
            debug!(task = %id, creature = creature.id.0, priority, "task taken from pool");
            self.in_progress.insert(id, record);
            return id;
        }

        let idle = idle_task(creature, ctx);
        self.assign_new(idle, TaskOrigin::Idle, creature.id)
    }

    pub fn assigned(&self, id: TaskId) -> Option<&TaskRecord> {
        self.in_progress.get(&id)
    }

    pub fn assigned_mut(&mut self, id: TaskId) -> Option<&mut TaskRecord> {
        self.in_progress.get_mut(&id)
    }

    /// Retires a task from the faction entirely.
    pub fn remove_task(&mut self, id: TaskId) -> Option<TaskRecord> {
        let record = match self.in_progress.remove(&id) {
            Some(record) => Some(record),
            None => self
                .available
                .iter()
                .position(|r| r.id == id)
                .map(|index| self.available.remove(index)),
        };
        self.site_tasks.retain(|_, task| *task != id);
        record
    }

    /// Marks an in-progress task failed and logs it. Faction work is reset
    /// and requeued at the back; behaviour and idle tasks are retired.
    pub fn task_failed(&mut self, id: TaskId, reason: TaskFailure, at: SimTimestamp) -> bool {
        let Some(mut record) = self.in_progress.remove(&id) else {
            return false;
        };
        self.failure_log.push(FailureRecord {
            task: id,
            label: record.task.label(),
            owner: record.owner,
            reason: reason.clone(),
            at,
        });
        if record.origin != TaskOrigin::Faction {
            debug!(task = %id, origin = %record.origin, "failed task retired");
            return true;
        }
        record.failure = Some(reason);
        record.owner = None;
        record.task.reset_progress();
        self.available.push(record);
        true
    }

    /// Returns an in-progress task to the pool without a failure mark.
    pub fn release_task(&mut self, id: TaskId) -> bool {
        let Some(mut record) = self.in_progress.remove(&id) else {
            return false;
        };
        // Filler work is never worth handing to someone else
        if record.origin == TaskOrigin::Faction {
            record.owner = None;
            record.task.reset_progress();
            self.available.push(record);
        }
        true
    }

    /// Clears the failure mark on at most `batch` failed tasks, oldest first.
    pub fn recycle(&mut self, batch: usize) -> usize {
        let mut recycled = 0;
        for record in self.available.iter_mut().filter(|r| r.is_failed()) {
            if recycled == batch {
                break;
            }
            record.failure = None;
            recycled += 1;
        }
        recycled
    }

    /// Periodic upkeep: raise build tasks for new blueprints and removal
    /// tasks for structures marked for removal, retire queued tasks whose
    /// target is gone, run the recycle pass when due and wake suspended
    /// tasks past their deadline.
    pub fn update(
        &mut self,
        clock: &SimClock,
        structures: &StructureRegistry,
        config: &SimConfig,
    ) -> FactionUpdate {
        let mut report = FactionUpdate::default();

        let fresh: Vec<StructureId> = structures
            .blueprints_of(self.id)
            .map(|b| b.id)
            .filter(|id| !self.site_tasks.contains_key(id))
            .collect();
        for blueprint in fresh {
            let id = self.add_task(Task::new(TaskKind::Build(Build::new(blueprint))), TaskOrigin::Faction);
            self.site_tasks.insert(blueprint, id);
            report.raised += 1;
        }

        let doomed: Vec<StructureId> = structures
            .marked_for_removal_of(self.id)
            .map(|s| s.id)
            .filter(|id| !self.site_tasks.contains_key(id))
            .collect();
        for structure in doomed {
            let id = self.add_task(Task::new(TaskKind::Remove(Remove::new(structure))), TaskOrigin::Faction);
            self.site_tasks.insert(structure, id);
            report.raised += 1;
        }

        let orphaned: Vec<TaskId> = self
            .available
            .iter()
            .filter(|r| match &r.task.kind {
                TaskKind::Build(build) => structures.blueprint(build.blueprint).is_none(),
                TaskKind::Remove(remove) => !structures.is_marked_for_removal(remove.structure),
                _ => false,
            })
            .map(|r| r.id)
            .collect();
        for id in orphaned {
            self.remove_task(id);
            report.retired += 1;
        }

        let hours = clock.elapsed_hours();
        if hours >= self.last_recycle_hour + config.scheduler.recycle_interval_hours {
            self.last_recycle_hour = hours;
            report.recycled = self.recycle(config.scheduler.recycle_batch);
        }

        if config.scheduler.auto_resume {
            for record in self.available.iter_mut() {
                if record.task.suspended_until().is_some_and(|d| clock.has_passed(d)) {
                    record.task.resume();
                    report.resumed += 1;
                }
            }
        }

        if report != FactionUpdate::default() {
            info!(
                faction = %self.name,
                raised = report.raised,
                retired = report.retired,
                recycled = report.recycled,
                resumed = report.resumed,
                "faction pool updated"
            );
        }
        report
    }

    pub fn available(&self) -> &[TaskRecord] {
        &self.available
    }

    pub fn in_progress_len(&self) -> usize {
        self.in_progress.len()
    }

    pub fn failure_log(&self) -> &[FailureRecord] {
        &self.failure_log
    }
}

/// Filler work: a short wander onto open ground, or a rest in place.
fn idle_task(creature: &Creature, ctx: &mut PlanningContext<'_>) -> Task {
    let tuning = &ctx.config.scheduler;
    let mut task = Task::new(TaskKind::Idle);

    if ctx.rng.gen_bool(tuning.idle_wander_chance) {
        let spots: Vec<_> = ctx
            .grid
            .cells_within(creature.cell, tuning.idle_wander_radius)
            .into_iter()
            .filter(|c| *c != creature.cell)
            .filter(|c| ctx.grid.traversal_cost(*c, creature.mobility) == 1.0)
            .filter(|c| ctx.occupancy.count(*c) == 0)
            .collect();
        if let Some(spot) = spots.choose(&mut *ctx.rng) {
            task.subtasks.push_back(Task::new(TaskKind::MoveTo(MoveTo::new(*spot))));
        }
    }

    if task.subtasks.is_empty() {
        let (low, high) = tuning.idle_wait_minutes;
        let minutes = ctx.rng.gen_range(low.min(high)..=high.max(low));
        task.subtasks
            .push_back(Task::new(TaskKind::Wait(Wait::new("chilling", minutes))));
    }
    task
}

/// All factions, by id.
#[derive(Resource, Debug, Default)]
pub struct FactionRegistry {
    factions: BTreeMap<FactionId, Faction>,
}

impl FactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, faction: Faction) {
        self.factions.insert(faction.id, faction);
    }

    pub fn get(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(&id)
    }

    pub fn get_mut(&mut self, id: FactionId) -> Option<&mut Faction> {
        self.factions.get_mut(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Faction> {
        self.factions.values().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Faction> {
        self.factions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Faction> {
        self.factions.values_mut()
    }

    /// Declares two factions enemies of each other.
    pub fn set_hostile(&mut self, a: FactionId, b: FactionId) {
        if let Some(faction) = self.factions.get_mut(&a) {
            faction.hostile.insert(b);
        }
        if let Some(faction) = self.factions.get_mut(&b) {
            faction.hostile.insert(a);
        }
    }

    pub fn is_hostile(&self, a: FactionId, b: FactionId) -> bool {
        self.get(a).is_some_and(|f| f.is_hostile(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creatures::Behaviour;
    use crate::grid::CellId;
    use crate::tasks::{RequiredSkill, Skill};
    use rand::SeedableRng;

    struct Fixture {
        grid: GridTopology,
        occupancy: Occupancy,
        clock: SimClock,
        rng: SmallRng,
        config: SimConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                grid: GridTopology::new(5, 5),
                occupancy: Occupancy::default(),
                clock: SimClock::new(1),
                rng: SmallRng::seed_from_u64(11),
                config: SimConfig::default(),
            }
        }

        fn planning(&mut self) -> PlanningContext<'_> {
            PlanningContext {
                grid: &self.grid,
                occupancy: &self.occupancy,
                clock: &self.clock,
                rng: &mut self.rng,
                config: &self.config,
            }
        }

        fn creature(&self, skills: &[(Skill, u8)]) -> Creature {
            let mut creature =
                Creature::new(CreatureId(1), "Worker", FactionId(0), &self.grid, CellId(12), Behaviour::Worker);
            for (skill, level) in skills {
                creature.skills.insert(*skill, *level);
            }
            creature
        }
    }

    fn chore(skill: Option<RequiredSkill>) -> Task {
        Task::new(TaskKind::Wait(Wait::new("chore", 5))).with_required(skill)
    }

    #[test]
    fn test_highest_priority_task_wins() {
        let mut fx = Fixture::new();
        let mut faction = Faction::new(FactionId(0), "settlers");
        let _t1 = faction.add_task(chore(None), TaskOrigin::Faction);
        let t2 = faction.add_task(chore(Some(RequiredSkill::new(Skill::Mine, 2))), TaskOrigin::Faction);

        let creature = fx.creature(&[(Skill::Mine, 8)]);
        let taken = faction.take_task(&creature, &mut fx.planning());
        assert_eq!(taken, t2);
        assert_eq!(faction.assigned(t2).unwrap().owner, Some(CreatureId(1)));
        assert_eq!(faction.available().len(), 1);
    }

    #[test]
    fn test_equal_priority_prefers_earliest() {
        let mut fx = Fixture::new();
        let mut faction = Faction::new(FactionId(0), "settlers");
        let first = faction.add_task(chore(None), TaskOrigin::Faction);
        faction.add_task(chore(None), TaskOrigin::Faction);

        let creature = fx.creature(&[]);
        assert_eq!(faction.take_task(&creature, &mut fx.planning()), first);
    }

    #[test]
    fn test_under_skilled_creature_gets_idle() {
        let mut fx = Fixture::new();
        let mut faction = Faction::new(FactionId(0), "settlers");
        let skilled = faction.add_task(chore(Some(RequiredSkill::new(Skill::Cook, 5))), TaskOrigin::Faction);

        let creature = fx.creature(&[(Skill::Cook, 3)]);
        let taken = faction.take_task(&creature, &mut fx.planning());
        assert_ne!(taken, skilled);
        let record = faction.assigned(taken).unwrap();
        assert!(matches!(record.task.kind, TaskKind::Idle));
        assert_eq!(record.origin, TaskOrigin::Idle);
        assert_eq!(record.task.subtasks.len(), 1);
        assert_eq!(faction.available().len(), 1);
    }

    #[test]
    fn test_failed_task_requeues_at_back_and_sits_out() {
        let mut fx = Fixture::new();
        let mut faction = Faction::new(FactionId(0), "settlers");
        let a = faction.add_task(chore(None), TaskOrigin::Faction);
        let b = faction.add_task(chore(None), TaskOrigin::Faction);
        let creature = fx.creature(&[]);

        assert_eq!(faction.take_task(&creature, &mut fx.planning()), a);
        assert!(faction.task_failed(a, TaskFailure::TargetGone, fx.clock.now()));

        let ids: Vec<TaskId> = faction.available().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(faction.available()[1].owner, None);
        assert_eq!(faction.failure_log().len(), 1);
        assert_eq!(faction.failure_log()[0].reason, TaskFailure::TargetGone);

        // The failed task is skipped until recycled
        assert_eq!(faction.take_task(&creature, &mut fx.planning()), b);
        let idle = faction.take_task(&creature, &mut fx.planning());
        assert_ne!(idle, a);

        assert_eq!(faction.recycle(10), 1);
        assert_eq!(faction.take_task(&creature, &mut fx.planning()), a);
    }

    #[test]
    fn test_recycle_is_bounded() {
        let mut fx = Fixture::new();
        let mut faction = Faction::new(FactionId(0), "settlers");
        let creature = fx.creature(&[]);
        for _ in 0..4 {
            let id = faction.add_task(chore(None), TaskOrigin::Faction);
            assert_eq!(faction.take_task(&creature, &mut fx.planning()), id);
            faction.task_failed(id, TaskFailure::Other("boom".into()), fx.clock.now());
        }
        assert_eq!(faction.recycle(3), 3);
        assert_eq!(faction.available().iter().filter(|r| r.is_failed()).count(), 1);
    }

    #[test]
    fn test_update_raises_and_retires_site_tasks() {
        let mut fx = Fixture::new();
        let mut structures = StructureRegistry::new();
        let mut faction = Faction::new(FactionId(0), "settlers");
        let site = fx.grid.cell_at(2, 2).unwrap();
        let blueprint = structures
            .place_blueprint(&mut fx.grid, "wall", site, FactionId(0), 4.0, 5.0)
            .unwrap();

        let report = faction.update(&fx.clock, &structures, &fx.config);
        assert_eq!(report.raised, 1);
        assert_eq!(faction.update(&fx.clock, &structures, &fx.config).raised, 0);

        structures.demolish(&mut fx.grid, blueprint).unwrap();
        let report = faction.update(&fx.clock, &structures, &fx.config);
        assert_eq!(report.retired, 1);
        assert!(faction.available().is_empty());
    }

    #[test]
    fn test_update_recycles_on_interval() {
        let mut fx = Fixture::new();
        let structures = StructureRegistry::new();
        let mut faction = Faction::new(FactionId(0), "settlers");
        let creature = fx.creature(&[]);
        let id = faction.add_task(chore(None), TaskOrigin::Faction);
        faction.take_task(&creature, &mut fx.planning());
        faction.task_failed(id, TaskFailure::TargetGone, fx.clock.now());

        assert_eq!(faction.update(&fx.clock, &structures, &fx.config).recycled, 0);
        let minutes = fx.config.scheduler.recycle_interval_hours * 60;
        for _ in 0..minutes {
            fx.clock.advance();
        }
        assert_eq!(faction.update(&fx.clock, &structures, &fx.config).recycled, 1);
    }

    #[test]
    fn test_release_returns_faction_work_only() {
        let mut fx = Fixture::new();
        let mut faction = Faction::new(FactionId(0), "settlers");
        let creature = fx.creature(&[]);
        let chore_id = faction.add_task(chore(None), TaskOrigin::Faction);
        assert_eq!(faction.take_task(&creature, &mut fx.planning()), chore_id);
        let idle_id = faction.take_task(&creature, &mut fx.planning());

        assert!(faction.release_task(chore_id));
        assert!(faction.release_task(idle_id));
        assert_eq!(faction.available().len(), 1);
        assert_eq!(faction.available()[0].id, chore_id);
        assert!(!faction.available()[0].is_failed());
        assert_eq!(faction.in_progress_len(), 0);
    }

    #[test]
    fn test_failed_filler_work_is_retired() {
        let mut fx = Fixture::new();
        let mut faction = Faction::new(FactionId(0), "wildlife");
        let creature = fx.creature(&[]);
        for _ in 0..20 {
            let idle = faction.take_task(&creature, &mut fx.planning());
            let reason = TaskFailure::Unreachable { attempts: 3 };
            assert!(faction.task_failed(idle, reason, fx.clock.now()));
        }
        let roam = faction.assign_new(chore(None), TaskOrigin::Behaviour, creature.id);
        assert!(faction.task_failed(roam, TaskFailure::TargetGone, fx.clock.now()));

        assert!(faction.available().is_empty());
        assert_eq!(faction.in_progress_len(), 0);
        assert_eq!(faction.failure_log().len(), 21);
        assert_eq!(faction.failure_log()[20].task, roam);
    }

    #[test]
    fn test_update_raises_removal_for_marked_structures() {
        let mut fx = Fixture::new();
        let mut structures = StructureRegistry::new();
        let mut faction = Faction::new(FactionId(0), "settlers");
        let cell = fx.grid.cell_at(1, 1).unwrap();
        let rubble = structures
            .place_structure(&mut fx.grid, "rubble", cell, FactionId(0), 4.0)
            .unwrap();
        assert_eq!(faction.update(&fx.clock, &structures, &fx.config).raised, 0);

        assert!(structures.mark_for_removal(rubble));
        assert_eq!(faction.update(&fx.clock, &structures, &fx.config).raised, 1);
        assert!(matches!(
            &faction.available()[0].task.kind,
            TaskKind::Remove(remove) if remove.structure == rubble
        ));
        assert_eq!(faction.update(&fx.clock, &structures, &fx.config).raised, 0);

        structures.demolish(&mut fx.grid, rubble).unwrap();
        let report = faction.update(&fx.clock, &structures, &fx.config);
        assert_eq!(report.retired, 1);
        assert!(faction.available().is_empty());
    }

    #[test]
    fn test_hostility_is_mutual() {
        let mut registry = FactionRegistry::new();
        registry.insert(Faction::new(FactionId(0), "settlers"));
        registry.insert(Faction::new(FactionId(1), "raiders"));
        registry.set_hostile(FactionId(0), FactionId(1));
        assert!(registry.is_hostile(FactionId(1), FactionId(0)));
        assert!(!registry.is_hostile(FactionId(0), FactionId(0)));
        assert_eq!(registry.by_name("raiders").unwrap().id, FactionId(1));
    }
}
