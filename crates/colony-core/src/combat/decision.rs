//! Combat Decision Engine
//!
//! Utility scoring for the three kinds of combat option:
//!
//! - offence: best in-range attack on the primary combatant; a vital target
//!   limb scores `prediction * 2 * aggression`, any other
//!   `prediction / aggression`
//! - defence: against the most dangerous unblocked incoming attack, the
//!   damage a defence prevents divided by aggression
//! - buff: the estimated effect of a buff that is not already running
//!
//! The highest score wins and exact ties are settled by a coin flip from
//! the injected RNG. With nothing to do, the creature closes in on the
//! nearest combatant outside its reach.

use bevy_ecs::prelude::*;
use colony_events::{CombatChoice, EventKind};
use rand::Rng;

use super::{ActiveBuff, CommittedDefense, PendingAttack};
use crate::clock::SimClock;
use crate::config::CombatConfig;
use crate::creatures::{Creature, CreatureId, CreatureRegistry};
use crate::grid::{CellId, Direction, GridTopology};
use crate::notify::NotificationSink;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredAttack {
    pub target: CreatureId,
    /// Attacker's limb and action index on that limb.
    pub limb: usize,
    pub action: usize,
    pub target_limb: usize,
    pub damage: f32,
    pub utility: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDefense {
    /// Index into the defender's incoming attacks.
    pub incoming: usize,
    pub limb: usize,
    pub action: usize,
    pub utility: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredBuff {
    pub limb: usize,
    pub buff: usize,
    pub utility: f32,
}

/// Best option found in each category, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CombatUtilities {
    pub offense: Option<ScoredAttack>,
    pub defense: Option<ScoredDefense>,
    pub buff: Option<ScoredBuff>,
}

impl CombatUtilities {
    /// Category with the highest utility; ties settled by coin flip.
    pub fn choose(&self, rng: &mut impl Rng) -> Option<CombatChoice> {
        let candidates = [
            self.offense.map(|o| (CombatChoice::Offense, o.utility)),
            self.defense.map(|d| (CombatChoice::Defense, d.utility)),
            self.buff.map(|b| (CombatChoice::Buff, b.utility)),
        ];
        let mut best: Option<(CombatChoice, f32)> = None;
        for (choice, utility) in candidates.into_iter().flatten() {
            if prefer(utility, best.map(|b| b.1), rng) {
                best = Some((choice, utility));
            }
        }
        best.map(|(choice, _)| choice)
    }
}

fn prefer(score: f32, best: Option<f32>, rng: &mut impl Rng) -> bool {
    match best {
        None => true,
        Some(top) => score > top || (score == top && rng.gen_bool(0.5)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatDecision {
    Attack(ScoredAttack),
    Defend(ScoredDefense),
    Buff(ScoredBuff),
    /// Step toward a combatant that is out of reach.
    Advance { toward: CreatureId, to: CellId },
    /// Nothing possible this round.
    Hold,
}

#[derive(Resource, Debug, Clone)]
pub struct CombatDecisionEngine {
    limb_busy_ticks: u32,
}

impl CombatDecisionEngine {
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            limb_busy_ticks: config.limb_busy_ticks,
        }
    }

    pub fn evaluate(&self, me: &Creature, creatures: &CreatureRegistry, rng: &mut impl Rng) -> CombatUtilities {
        let aggression = me.combat.aggression.max(f32::EPSILON);
        CombatUtilities {
            offense: best_attack(me, creatures, aggression),
            defense: best_defense(me, aggression, rng),
            buff: best_buff(me, rng),
        }
    }

    pub fn decide(
        &self,
        me: &Creature,
        creatures: &CreatureRegistry,
        grid: &GridTopology,
        rng: &mut impl Rng,
    ) -> CombatDecision {
        let utilities = self.evaluate(me, creatures, rng);
        match utilities.choose(rng) {
            Some(CombatChoice::Offense) => utilities.offense.map(CombatDecision::Attack),
            Some(CombatChoice::Defense) => utilities.defense.map(CombatDecision::Defend),
            Some(CombatChoice::Buff) => utilities.buff.map(CombatDecision::Buff),
            Some(CombatChoice::Advance) | None => None,
        }
        .unwrap_or_else(|| advance(me, creatures, grid))
    }

    /// Commits a decision: marks the limb busy and applies its side effects.
    pub fn apply(
        &self,
        me: CreatureId,
        decision: CombatDecision,
        creatures: &mut CreatureRegistry,
        grid: &GridTopology,
        events: &mut dyn NotificationSink,
        clock: &SimClock,
    ) {
        let Some(creature) = creatures.get_mut(me) else {
            return;
        };
        let body = &mut creature.combat.body;
        let (choice, action, target, utility) = match decision {
            CombatDecision::Attack(attack) => {
                let Some(limb) = body.limbs.get_mut(attack.limb) else {
                    return;
                };
                let Some(offense) = limb.offense.get(attack.action).cloned() else {
                    return;
                };
                limb.busy_ticks = self.limb_busy_ticks;
                if let Some(victim) = creatures.get_mut(attack.target) {
                    victim.combat.incoming.push(PendingAttack {
                        attacker: me,
                        action: offense.name.clone(),
                        damage: attack.damage,
                        target_limb: attack.target_limb,
                        windup_ticks: offense.windup_ticks,
                        defense: None,
                    });
                    victim.combat.add_combatant(me);
                }
                (CombatChoice::Offense, offense.name, Some(attack.target.0), attack.utility)
            }
            CombatDecision::Defend(defense) => {
                let Some(limb) = body.limbs.get_mut(defense.limb) else {
                    return;
                };
                let Some(action) = limb.defense.get(defense.action).cloned() else {
                    return;
                };
                limb.busy_ticks = self.limb_busy_ticks;
                let attacker = creature.combat.incoming.get_mut(defense.incoming).map(|incoming| {
                    incoming.defense = Some(CommittedDefense {
                        limb: defense.limb,
                        name: action.name.clone(),
                        kind: action.kind,
                    });
                    incoming.attacker.0
                });
                (CombatChoice::Defense, action.name, attacker, defense.utility)
            }
            CombatDecision::Buff(buff) => {
                let Some(limb) = body.limbs.get_mut(buff.limb) else {
                    return;
                };
                let Some(action) = limb.buffs.get(buff.buff).cloned() else {
                    return;
                };
                limb.busy_ticks = self.limb_busy_ticks;
                body.active_buffs.push(ActiveBuff {
                    name: action.name.clone(),
                    effect: action.effect,
                    remaining_ticks: action.duration_ticks,
                });
                (CombatChoice::Buff, action.name, None, buff.utility)
            }
            CombatDecision::Advance { toward, to } => {
                let Some(at) = grid.coordinates(to) else {
                    return;
                };
                creature.place(to, at);
                (CombatChoice::Advance, "advance".to_string(), Some(toward.0), 0.0)
            }
            CombatDecision::Hold => return,
        };

        if let Some(creature) = creatures.get(me) {
            events.notify(
                clock.now(),
                Some(creature.snapshot()),
                EventKind::CombatDecision {
                    choice,
                    action,
                    target,
                    utility,
                },
            );
        }
    }
}

fn primary_target<'a>(me: &Creature, creatures: &'a CreatureRegistry) -> Option<&'a Creature> {
    me.combat
        .combatants
        .iter()
        .filter_map(|id| creatures.get(*id))
        .find(|c| c.alive)
}

fn best_attack(me: &Creature, creatures: &CreatureRegistry, aggression: f32) -> Option<ScoredAttack> {
    let target = primary_target(me, creatures)?;
    let distance = me.position.chebyshev(target.position);
    let bonus = me.combat.body.weapon_bonus();

    let mut best: Option<ScoredAttack> = None;
    for (limb_index, limb) in me.combat.body.limbs.iter().enumerate() {
        if !limb.is_free() {
            continue;
        }
        for (action_index, action) in limb.offense.iter().enumerate() {
            if action.range < distance {
                continue;
            }
            let prediction = action.damage + bonus;
            for (target_index, target_limb) in target.combat.body.limbs.iter().enumerate() {
                if !target_limb.is_enabled() {
                    continue;
                }
                let utility = if target_limb.vital {
                    prediction * 2.0 * aggression
                } else {
                    prediction / aggression
                };
                if best.map_or(true, |b| utility > b.utility) {
                    best = Some(ScoredAttack {
                        target: target.id,
                        limb: limb_index,
                        action: action_index,
                        target_limb: target_index,
                        damage: prediction,
                        utility,
                    });
                }
            }
        }
    }
    best
}

fn best_defense(me: &Creature, aggression: f32, rng: &mut impl Rng) -> Option<ScoredDefense> {
    let mut threat: Option<(usize, f32)> = None;
    for (index, attack) in me.combat.incoming.iter().enumerate() {
        if attack.defense.is_some() {
            continue;
        }
        if prefer(attack.damage, threat.map(|t| t.1), rng) {
            threat = Some((index, attack.damage));
        }
    }
    let (incoming_index, incoming) = threat?;

    let stats = &me.combat.body.stats;
    let mut best: Option<ScoredDefense> = None;
    for (limb_index, limb) in me.combat.body.limbs.iter().enumerate() {
        if !limb.is_free() {
            continue;
        }
        for (action_index, action) in limb.defense.iter().enumerate() {
            let residual = action.residual(incoming, stats);
            let utility = (incoming - residual) / aggression;
            if prefer(utility, best.map(|b| b.utility), rng) {
                best = Some(ScoredDefense {
                    incoming: incoming_index,
                    limb: limb_index,
                    action: action_index,
                    utility,
                });
            }
        }
    }
    best
}

fn best_buff(me: &Creature, rng: &mut impl Rng) -> Option<ScoredBuff> {
    let body = &me.combat.body;
    let mut best: Option<ScoredBuff> = None;
    for (limb_index, limb) in body.limbs.iter().enumerate() {
        if !limb.is_free() {
            continue;
        }
        for (buff_index, buff) in limb.buffs.iter().enumerate() {
            if body.is_buff_active(&buff.name) {
                continue;
            }
            let utility = buff.effect.estimate();
            if prefer(utility, best.map(|b| b.utility), rng) {
                best = Some(ScoredBuff {
                    limb: limb_index,
                    buff: buff_index,
                    utility,
                });
            }
        }
    }
    best
}

/// One step toward the nearest combatant beyond the creature's shortest reach.
fn advance(me: &Creature, creatures: &CreatureRegistry, grid: &GridTopology) -> CombatDecision {
    let reach = me
        .combat
        .body
        .limbs
        .iter()
        .filter(|l| l.is_enabled())
        .flat_map(|l| l.offense.iter().map(|a| a.range))
        .min()
        .unwrap_or(1);

    let nearest = me
        .combat
        .combatants
        .iter()
        .filter_map(|id| creatures.get(*id))
        .filter(|c| c.alive)
        .map(|c| (c, me.position.chebyshev(c.position)))
        .filter(|(_, distance)| *distance > reach)
        .min_by_key(|(_, distance)| *distance);
    let Some((target, _)) = nearest else {
        return CombatDecision::Hold;
    };

    let dx = target.position.x - me.position.x;
    let dy = target.position.y - me.position.y;
    Direction::toward(dx, dy)
        .and_then(|direction| grid.neighbor(me.cell, direction))
        .filter(|next| grid.pathable(*next, me.mobility))
        .map(|to| CombatDecision::Advance {
            toward: target.id,
            to,
        })
        .unwrap_or(CombatDecision::Hold)
}
