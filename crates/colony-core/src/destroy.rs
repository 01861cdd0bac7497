//! Destroy Cache
//!
//! Deaths and demolitions requested while systems run are parked here and
//! applied together once per tick, after every other system is done with
//! the entities.

use bevy_ecs::prelude::*;
use colony_events::{EventKind, GridPoint};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

use crate::clock::SimClock;
use crate::creatures::{CreatureId, CreatureRegistry};
use crate::grid::{Coordinates, GridError, SharedGrid};
use crate::notify::NotificationSink;
use crate::structures::{StructureId, StructureRegistry};
use crate::tasks::FactionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Doomed {
    Creature(CreatureId),
    Structure(StructureId),
}

/// What a flush touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub creatures: Vec<CreatureId>,
    pub structures: Vec<StructureId>,
    pub released_tasks: usize,
    /// Entries the grid refused; everything after them was still applied.
    pub failed: Vec<Doomed>,
}

/// Registries a flush removes entities from.
pub struct DestroyTargets<'a> {
    pub creatures: &'a mut CreatureRegistry,
    pub factions: &'a mut FactionRegistry,
    pub structures: &'a mut StructureRegistry,
    pub grid: &'a SharedGrid,
    pub events: &'a mut dyn NotificationSink,
    pub clock: &'a SimClock,
}

#[derive(Resource, Debug, Default)]
pub struct DestroyCache {
    pending: Mutex<Vec<Doomed>>,
}

impl DestroyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Doomed>> {
        // A panic while holding the lock cannot leave the list half-written
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues an entity; queuing the same one twice is harmless.
    pub fn queue(&self, doomed: Doomed) {
        let mut pending = self.lock();
        if !pending.contains(&doomed) {
            pending.push(doomed);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn drain(&self) -> Vec<Doomed> {
        std::mem::take(&mut *self.lock())
    }

    /// Removes everything queued. A dead creature's task goes back to its
    /// faction; a structure's cell is freed on the grid.
    pub fn flush(&self, targets: &mut DestroyTargets<'_>) -> FlushReport {
        let mut report = FlushReport::default();
        for doomed in self.drain() {
            match doomed {
                Doomed::Creature(id) => {
                    let Some(creature) = targets.creatures.remove(id) else {
                        continue;
                    };
                    if let Some(task) = creature.task {
                        let released = targets
                            .factions
                            .get_mut(task.faction)
                            .is_some_and(|faction| faction.release_task(task));
                        if released {
                            report.released_tasks += 1;
                            targets.events.notify(
                                targets.clock.now(),
                                Some(creature.snapshot()),
                                EventKind::TaskReleased { task: task.to_string() },
                            );
                        }
                    }
                    debug!(creature = id.0, name = %creature.name, "creature removed");
                    report.creatures.push(id);
                }
                Doomed::Structure(id) => match demolish(targets, id) {
                    Ok(true) => report.structures.push(id),
                    Ok(false) => {}
                    Err(err) => {
                        error!(%err, structure = id.0, "demolition failed");
                        report.failed.push(doomed);
                    }
                },
            }
        }
        report
    }
}

fn demolish(targets: &mut DestroyTargets<'_>, id: StructureId) -> Result<bool, GridError> {
    let mut grid = targets.grid.write()?;
    let Some(gone) = targets.structures.demolish(&mut grid, id)? else {
        return Ok(false);
    };
    let at = grid.coordinates(gone.cell).unwrap_or(Coordinates::new(0, 0));
    drop(grid);
    debug!(structure = id.0, name = %gone.name, "structure demolished");
    targets.events.notify(
        targets.clock.now(),
        None,
        EventKind::StructureDemolished {
            structure: gone.name,
            at: GridPoint::new(at.x, at.y),
        },
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creatures::{Behaviour, Creature};
    use crate::grid::{GridTopology, Mobility, IMPASSABLE};
    use crate::notify::RecordingSink;
    use crate::tasks::{Faction, FactionId, Task, TaskKind, TaskOrigin, Wait};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_queue_from_many_threads() {
        let cache = Arc::new(DestroyCache::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.queue(Doomed::Creature(CreatureId(i))))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        cache.queue(Doomed::Creature(CreatureId(0)));
        assert_eq!(cache.len(), 4);
        assert_eq!(cache.drain().len(), 4);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_flush_removes_creature_and_releases_task() {
        let grid = GridTopology::new(3, 3);
        let mut creatures = CreatureRegistry::new();
        let id = creatures.allocate_id();
        let cell = grid.cell_at(1, 1).unwrap();
        creatures.insert(Creature::new(id, "Ada", FactionId(0), &grid, cell, Behaviour::Person));
        let shared = SharedGrid::new(grid);

        let mut factions = FactionRegistry::new();
        let mut faction = Faction::new(FactionId(0), "settlers");
        let task_id = faction.add_task(Task::new(TaskKind::Wait(Wait::new("guard", 60))), TaskOrigin::Faction);
        factions.insert(faction);

        // Hand the task out the way the executor does
        {
            let faction = factions.get_mut(FactionId(0)).unwrap();
            let creature = creatures.get(id).unwrap();
            let grid = shared.read().unwrap();
            let occupancy = creatures.occupancy();
            let config = crate::config::SimConfig::default();
            let clock = SimClock::new(1);
            let mut rng = <rand::rngs::SmallRng as rand::SeedableRng>::seed_from_u64(1);
            let mut planning = crate::tasks::PlanningContext {
                grid: &grid,
                occupancy: &occupancy,
                clock: &clock,
                rng: &mut rng,
                config: &config,
            };
            assert_eq!(faction.take_task(creature, &mut planning), task_id);
        }
        creatures.get_mut(id).unwrap().task = Some(task_id);

        let cache = DestroyCache::new();
        cache.queue(Doomed::Creature(id));
        let mut structures = StructureRegistry::new();
        let mut sink = RecordingSink::default();
        let clock = SimClock::new(1);
        let report = cache
            .flush(&mut DestroyTargets {
                creatures: &mut creatures,
                factions: &mut factions,
                structures: &mut structures,
                grid: &shared,
                events: &mut sink,
                clock: &clock,
            });

        assert_eq!(report.creatures, vec![id]);
        assert_eq!(report.released_tasks, 1);
        assert!(creatures.get(id).is_none());
        assert_eq!(factions.get(FactionId(0)).unwrap().available().len(), 1);
        assert!(matches!(sink.kinds[0], EventKind::TaskReleased { .. }));
    }

    #[test]
    fn test_flush_demolishes_structure() {
        let mut grid = GridTopology::new(3, 3);
        let cell = grid.cell_at(1, 1).unwrap();
        let mut structures = StructureRegistry::new();
        let id = structures
            .place_blueprint(&mut grid, "wall", cell, FactionId(0), IMPASSABLE, 1.0)
            .unwrap();
        structures.complete(&mut grid, id).unwrap();
        assert!(!grid.pathable(cell, Mobility::Walk));
        let shared = SharedGrid::new(grid);

        let cache = DestroyCache::new();
        cache.queue(Doomed::Structure(id));
        let mut creatures = CreatureRegistry::new();
        let mut factions = FactionRegistry::new();
        let mut sink = RecordingSink::default();
        let clock = SimClock::new(1);
        let report = cache
            .flush(&mut DestroyTargets {
                creatures: &mut creatures,
                factions: &mut factions,
                structures: &mut structures,
                grid: &shared,
                events: &mut sink,
                clock: &clock,
            });

        assert_eq!(report.structures, vec![id]);
        assert!(report.failed.is_empty());
        assert!(shared.read().unwrap().pathable(cell, Mobility::Walk));
        assert!(matches!(
            &sink.kinds[0],
            EventKind::StructureDemolished { structure, .. } if structure == "wall"
        ));
    }

    #[test]
    fn test_flush_keeps_going_past_a_grid_error() {
        let mut grid = GridTopology::new(4, 4);
        let mut structures = StructureRegistry::new();
        let far = grid.cell_at(3, 3).unwrap();
        let near = grid.cell_at(0, 0).unwrap();
        let lost = structures.place_structure(&mut grid, "rubble", far, FactionId(0), 4.0).unwrap();
        let kept = structures.place_structure(&mut grid, "rubble", near, FactionId(0), 4.0).unwrap();

        // The shared grid is smaller than the one the structures were placed on
        let shared = SharedGrid::new(GridTopology::new(2, 2));
        let cache = DestroyCache::new();
        cache.queue(Doomed::Structure(lost));
        cache.queue(Doomed::Structure(kept));

        let mut creatures = CreatureRegistry::new();
        let mut factions = FactionRegistry::new();
        let mut sink = RecordingSink::default();
        let clock = SimClock::new(1);
        let report = cache.flush(&mut DestroyTargets {
            creatures: &mut creatures,
            factions: &mut factions,
            structures: &mut structures,
            grid: &shared,
            events: &mut sink,
            clock: &clock,
        });

        assert_eq!(report.failed, vec![Doomed::Structure(lost)]);
        assert_eq!(report.structures, vec![kept]);
        assert!(structures.structure(lost).is_some());
        assert!(structures.structure(kept).is_none());
        assert!(cache.is_empty());
    }
}
