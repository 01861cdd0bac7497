//! ECS Systems
//!
//! One tick of the simulation is a chained schedule:
//! clock, needs, faction pools, agents, combat, destruction, event flush.

use bevy_ecs::prelude::*;
use colony_events::EventKind;
use tracing::warn;

use crate::clock::SimClock;
use crate::combat::{engage_hostiles, resolve_incoming, upkeep, CombatDecisionEngine};
use crate::config::SimConfig;
use crate::creatures::executor::{AgentExecutor, TickReport, TickServices};
use crate::creatures::CreatureRegistry;
use crate::destroy::{DestroyCache, DestroyTargets};
use crate::grid::SharedGrid;
use crate::notify::{EventLog, NotificationSink};
use crate::pathfinding::PathRequestQueue;
use crate::structures::StructureRegistry;
use crate::tasks::FactionRegistry;
use crate::SimRng;

/// Running totals over the whole run.
#[derive(Resource, Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub assigned: usize,
    pub completed: usize,
    pub failed: usize,
    pub recycled: usize,
    pub deaths: usize,
    pub demolished: usize,
}

impl RunSummary {
    pub fn record(&mut self, report: &TickReport) {
        self.assigned += report.assigned;
        self.completed += report.completed;
        self.failed += report.failed;
    }
}

/// Run condition: false while the clock is paused.
pub fn simulation_running(clock: Res<SimClock>) -> bool {
    !clock.is_paused()
}

pub fn advance_clock(mut clock: ResMut<SimClock>, mut summary: ResMut<RunSummary>) {
    clock.advance();
    summary.ticks += 1;
}

/// Needs drift: every live creature loses a little energy each tick.
pub fn live(mut creatures: ResMut<CreatureRegistry>, config: Res<SimConfig>) {
    let decay = config.agents.energy_decay_per_tick;
    for creature in creatures.iter_mut().filter(|c| c.alive) {
        creature.needs.energy = (creature.needs.energy - decay).max(0.0);
    }
}

pub fn update_factions(
    mut factions: ResMut<FactionRegistry>,
    structures: Res<StructureRegistry>,
    mut log: ResMut<EventLog>,
    mut summary: ResMut<RunSummary>,
    clock: Res<SimClock>,
    config: Res<SimConfig>,
) {
    if !clock.every(config.scheduler.update_interval_ticks) {
        return;
    }
    for faction in factions.iter_mut() {
        let update = faction.update(&clock, &structures, &config);
        if update.recycled > 0 {
            summary.recycled += update.recycled;
            log.notify(
                clock.now(),
                None,
                EventKind::TasksRecycled {
                    faction: faction.name.clone(),
                    count: update.recycled,
                },
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run_agents(
    mut executor: ResMut<AgentExecutor>,
    mut creatures: ResMut<CreatureRegistry>,
    mut factions: ResMut<FactionRegistry>,
    mut paths: ResMut<PathRequestQueue>,
    mut structures: ResMut<StructureRegistry>,
    mut rng: ResMut<SimRng>,
    mut log: ResMut<EventLog>,
    mut summary: ResMut<RunSummary>,
    destroy: Res<DestroyCache>,
    grid: Res<SharedGrid>,
    clock: Res<SimClock>,
    config: Res<SimConfig>,
) {
    let mut services = TickServices {
        grid: &grid,
        paths: &mut paths,
        clock: &clock,
        rng: &mut rng.0,
        structures: &mut structures,
        destroy: &destroy,
        events: &mut *log,
        config: &config,
    };
    let report = executor.tick(&mut creatures, &mut factions, &mut services);
    summary.record(&report);
}

#[allow(clippy::too_many_arguments)]
pub fn run_combat(
    engine: Res<CombatDecisionEngine>,
    mut creatures: ResMut<CreatureRegistry>,
    factions: Res<FactionRegistry>,
    destroy: Res<DestroyCache>,
    mut rng: ResMut<SimRng>,
    mut log: ResMut<EventLog>,
    mut summary: ResMut<RunSummary>,
    grid: Res<SharedGrid>,
    clock: Res<SimClock>,
    config: Res<SimConfig>,
) {
    upkeep(&mut creatures, config.combat.disengage_radius);
    engage_hostiles(&mut creatures, &factions, config.combat.engage_radius);

    if clock.every(config.combat.decision_interval_ticks) {
        let topology = match grid.read() {
            Ok(topology) => topology,
            Err(err) => {
                warn!(%err, "combat decisions skipped");
                return;
            }
        };
        for id in creatures.ids() {
            let Some(me) = creatures.get(id).filter(|c| c.alive && c.in_combat()) else {
                continue;
            };
            let decision = engine.decide(me, &creatures, &topology, &mut rng.0);
            engine.apply(id, decision, &mut creatures, &topology, &mut *log, &clock);
        }
    }

    summary.deaths += resolve_incoming(&mut creatures, &mut rng.0, &destroy, &mut *log, &clock);
}

#[allow(clippy::too_many_arguments)]
pub fn flush_destroy_cache(
    destroy: Res<DestroyCache>,
    mut creatures: ResMut<CreatureRegistry>,
    mut factions: ResMut<FactionRegistry>,
    mut structures: ResMut<StructureRegistry>,
    mut log: ResMut<EventLog>,
    mut summary: ResMut<RunSummary>,
    grid: Res<SharedGrid>,
    clock: Res<SimClock>,
) {
    if destroy.is_empty() {
        return;
    }
    let mut targets = DestroyTargets {
        creatures: &mut creatures,
        factions: &mut factions,
        structures: &mut structures,
        grid: &grid,
        events: &mut *log,
        clock: &clock,
    };
    let report = destroy.flush(&mut targets);
    summary.demolished += report.structures.len();
    if !report.failed.is_empty() {
        warn!(count = report.failed.len(), "destroy cache entries could not be applied");
    }
}

pub fn flush_events(mut log: ResMut<EventLog>) {
    if let Err(err) = log.flush() {
        warn!(%err, "failed to flush event log");
    }
}

/// Builds the per-tick schedule.
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            advance_clock,
            live,
            update_factions,
            run_agents,
            run_combat,
            flush_destroy_cache,
            flush_events,
        )
            .chain()
            .run_if(simulation_running),
    );
    schedule
}
