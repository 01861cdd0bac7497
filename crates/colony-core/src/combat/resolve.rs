//! Engagement and hit resolution.

use colony_events::EventKind;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

use super::{DefenseKind, DodgeRoll, PendingAttack};
use crate::clock::SimClock;
use crate::creatures::{CreatureId, CreatureRegistry};
use crate::destroy::{DestroyCache, Doomed};
use crate::grid::Coordinates;
use crate::notify::NotificationSink;
use crate::tasks::{FactionId, FactionRegistry};

/// Makes live creatures of hostile factions within `radius` of each other
/// combatants. Returns the number of hostile pairs in reach.
pub fn engage_hostiles(creatures: &mut CreatureRegistry, factions: &FactionRegistry, radius: u32) -> usize {
    let roster: Vec<(CreatureId, FactionId, Coordinates)> = creatures
        .iter()
        .filter(|c| c.alive)
        .map(|c| (c.id, c.faction, c.position))
        .collect();

    let mut pairs = Vec::new();
    for (i, (a, a_faction, a_at)) in roster.iter().enumerate() {
        for (b, b_faction, b_at) in &roster[i + 1..] {
            if factions.is_hostile(*a_faction, *b_faction) && a_at.chebyshev(*b_at) <= radius {
                pairs.push((*a, *b));
            }
        }
    }

    for (a, b) in &pairs {
        if let Some(creature) = creatures.get_mut(*a) {
            creature.combat.add_combatant(*b);
        }
        if let Some(creature) = creatures.get_mut(*b) {
            creature.combat.add_combatant(*a);
        }
    }
    pairs.len()
}

/// Ticks limbs and buffs, and forgets combatants that died, vanished or
/// moved beyond `disengage_radius`.
pub fn upkeep(creatures: &mut CreatureRegistry, disengage_radius: u32) {
    let positions: BTreeMap<CreatureId, Coordinates> = creatures
        .iter()
        .filter(|c| c.alive)
        .map(|c| (c.id, c.position))
        .collect();

    for creature in creatures.iter_mut().filter(|c| c.alive) {
        creature.combat.body.tick();
        let here = creature.position;
        creature
            .combat
            .combatants
            .retain(|other| positions.get(other).is_some_and(|at| at.chebyshev(here) <= disengage_radius));
    }
}

/// Counts down wind-ups and lands attacks whose wind-up has run out.
/// Attacks from owners no longer alive are dropped unresolved. Creatures
/// killed here are queued on the destroy cache; the count is returned.
pub fn resolve_incoming(
    creatures: &mut CreatureRegistry,
    rng: &mut impl Rng,
    destroy: &DestroyCache,
    events: &mut dyn NotificationSink,
    clock: &SimClock,
) -> usize {
    let mut deaths = 0;
    for id in creatures.ids() {
        let Some(incoming) = creatures
            .get_mut(id)
            .filter(|c| c.alive)
            .map(|c| std::mem::take(&mut c.combat.incoming))
        else {
            continue;
        };
        if incoming.is_empty() {
            continue;
        }

        let mut waiting = Vec::new();
        let mut landing = Vec::new();
        for mut attack in incoming {
            if !creatures.is_alive(attack.attacker) {
                let actor = creatures.get(id).map(|c| c.snapshot());
                events.notify(
                    clock.now(),
                    actor,
                    EventKind::AttackDiscarded {
                        attacker: attack.attacker.0,
                    },
                );
                continue;
            }
            attack.windup_ticks = attack.windup_ticks.saturating_sub(1);
            if attack.windup_ticks > 0 {
                waiting.push(attack);
            } else {
                landing.push(attack);
            }
        }

        let Some(target) = creatures.get_mut(id) else {
            continue;
        };
        let mut fatal: Option<PendingAttack> = None;
        for attack in landing {
            let body = &mut target.combat.body;
            let mut damage = match attack.defense.as_ref().map(|d| d.kind) {
                Some(DefenseKind::Block { absorb }) => (attack.damage - absorb).max(0.0),
                Some(DefenseKind::Dodge) => attack.damage * DodgeRoll::roll(body.stats.dexterity, rng).multiplier(),
                None => attack.damage,
            };
            damage = (damage - body.shield_absorb()).max(0.0);

            let limb_name = match body.limbs.get_mut(attack.target_limb) {
                Some(limb) => {
                    limb.health -= damage;
                    limb.name.clone()
                }
                None => continue,
            };
            events.notify(
                clock.now(),
                Some(target.snapshot()),
                EventKind::AttackResolved {
                    attacker: attack.attacker.0,
                    limb: limb_name,
                    damage,
                },
            );
            if fatal.is_none() && target.combat.body.is_dead() {
                fatal = Some(attack);
            }
        }
        target.combat.incoming = waiting;

        if let Some(killing_blow) = fatal {
            target.alive = false;
            destroy.queue(Doomed::Creature(id));
            deaths += 1;
            debug!(creature = id.0, attacker = killing_blow.attacker.0, "creature killed");
            events.notify(
                clock.now(),
                Some(target.snapshot()),
                EventKind::CreatureDied {
                    cause: format!("{} from creature {}", killing_blow.action, killing_blow.attacker.0),
                },
            );
        }
    }
    deaths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::CommittedDefense;
    use crate::creatures::{Behaviour, Creature};
    use crate::grid::GridTopology;
    use crate::notify::RecordingSink;
    use crate::tasks::Faction;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn duel(gap: i32) -> (GridTopology, CreatureRegistry, FactionRegistry) {
        let grid = GridTopology::new(12, 3);
        let mut creatures = CreatureRegistry::new();
        for (faction, x) in [(0u16, 0), (1u16, gap)] {
            let id = creatures.allocate_id();
            let cell = grid.cell_at(x, 1).unwrap();
            creatures.insert(Creature::new(id, format!("c{faction}"), FactionId(faction), &grid, cell, Behaviour::Worker));
        }
        let mut factions = FactionRegistry::new();
        factions.insert(Faction::new(FactionId(0), "settlers"));
        factions.insert(Faction::new(FactionId(1), "raiders"));
        factions.set_hostile(FactionId(0), FactionId(1));
        (grid, creatures, factions)
    }

    fn punch(attacker: u64, damage: f32, windup_ticks: u32) -> PendingAttack {
        PendingAttack {
            attacker: CreatureId(attacker),
            action: "punch".into(),
            damage,
            target_limb: 0,
            windup_ticks,
            defense: None,
        }
    }

    #[test]
    fn test_engage_only_hostiles_in_radius() {
        let (_grid, mut creatures, factions) = duel(3);
        assert_eq!(engage_hostiles(&mut creatures, &factions, 2), 0);
        assert_eq!(engage_hostiles(&mut creatures, &factions, 3), 1);
        assert_eq!(creatures.get(CreatureId(0)).unwrap().combat.combatants, vec![CreatureId(1)]);
        assert_eq!(creatures.get(CreatureId(1)).unwrap().combat.combatants, vec![CreatureId(0)]);
    }

    #[test]
    fn test_upkeep_disengages_distant_combatants() {
        let (_grid, mut creatures, factions) = duel(3);
        engage_hostiles(&mut creatures, &factions, 5);
        upkeep(&mut creatures, 5);
        assert!(creatures.get(CreatureId(0)).unwrap().in_combat());
        upkeep(&mut creatures, 2);
        assert!(!creatures.get(CreatureId(0)).unwrap().in_combat());
    }

    #[test]
    fn test_attack_lands_after_windup() {
        let (_grid, mut creatures, _) = duel(1);
        creatures.get_mut(CreatureId(1)).unwrap().combat.incoming.push(punch(0, 4.0, 2));
        let mut rng = SmallRng::seed_from_u64(1);
        let mut sink = RecordingSink::default();
        let cache = DestroyCache::new();
        let clock = SimClock::new(1);

        resolve_incoming(&mut creatures, &mut rng, &cache, &mut sink, &clock);
        assert!(sink.kinds.is_empty());
        assert_eq!(creatures.get(CreatureId(1)).unwrap().combat.incoming.len(), 1);

        resolve_incoming(&mut creatures, &mut rng, &cache, &mut sink, &clock);
        let target = creatures.get(CreatureId(1)).unwrap();
        assert!(target.combat.incoming.is_empty());
        assert_eq!(target.combat.body.limbs[0].health, 26.0);
        assert!(matches!(sink.kinds[0], EventKind::AttackResolved { damage, .. } if damage == 4.0));
    }

    #[test]
    fn test_block_absorbs_damage() {
        let (_grid, mut creatures, _) = duel(1);
        let mut attack = punch(0, 4.0, 1);
        attack.defense = Some(CommittedDefense {
            limb: 2,
            name: "block".into(),
            kind: DefenseKind::Block { absorb: 3.0 },
        });
        creatures.get_mut(CreatureId(1)).unwrap().combat.incoming.push(attack);

        let mut rng = SmallRng::seed_from_u64(1);
        let cache = DestroyCache::new();
        resolve_incoming(&mut creatures, &mut rng, &cache, &mut RecordingSink::default(), &SimClock::new(1));
        assert_eq!(creatures.get(CreatureId(1)).unwrap().combat.body.limbs[0].health, 29.0);
    }

    #[test]
    fn test_attack_from_dead_owner_is_discarded() {
        let (_grid, mut creatures, _) = duel(1);
        creatures.get_mut(CreatureId(0)).unwrap().alive = false;
        creatures.get_mut(CreatureId(1)).unwrap().combat.incoming.push(punch(0, 50.0, 1));

        let mut rng = SmallRng::seed_from_u64(1);
        let mut sink = RecordingSink::default();
        let cache = DestroyCache::new();
        resolve_incoming(&mut creatures, &mut rng, &cache, &mut sink, &SimClock::new(1));

        let target = creatures.get(CreatureId(1)).unwrap();
        assert!(target.alive);
        assert!(target.combat.incoming.is_empty());
        assert_eq!(sink.kinds, vec![EventKind::AttackDiscarded { attacker: 0 }]);
    }

    #[test]
    fn test_fatal_blow_queues_destruction() {
        let (_grid, mut creatures, _) = duel(1);
        let mut blow = punch(0, 25.0, 1);
        blow.target_limb = 1;
        creatures.get_mut(CreatureId(1)).unwrap().combat.incoming.push(blow);

        let mut rng = SmallRng::seed_from_u64(1);
        let mut sink = RecordingSink::default();
        let cache = DestroyCache::new();
        let deaths = resolve_incoming(&mut creatures, &mut rng, &cache, &mut sink, &SimClock::new(1));

        assert_eq!(deaths, 1);
        assert!(!creatures.is_alive(CreatureId(1)));
        assert_eq!(cache.drain(), vec![Doomed::Creature(CreatureId(1))]);
        assert!(matches!(sink.kinds.last(), Some(EventKind::CreatureDied { .. })));
    }
}
