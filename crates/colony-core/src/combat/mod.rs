//! Combat
//!
//! Creatures with combatants skip the task pipeline and fight: every few
//! ticks they score offence, defence and buff options and commit to the
//! best one. Committed attacks wind up on the target and resolve later.

mod body;
pub mod decision;
mod resolve;

pub use body::{
    ActiveBuff, BuffAction, BuffEffect, Body, DamageType, DefenseKind, DefensiveAction, DodgeRoll, Limb,
    OffensiveAction, Stats,
};
pub use decision::{CombatDecision, CombatDecisionEngine, CombatUtilities, ScoredAttack, ScoredBuff, ScoredDefense};
pub use resolve::{engage_hostiles, resolve_incoming, upkeep};

use crate::creatures::CreatureId;

/// Defence committed against one incoming attack.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedDefense {
    pub limb: usize,
    pub name: String,
    pub kind: DefenseKind,
}

/// An attack committed against a creature, waiting to land.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAttack {
    pub attacker: CreatureId,
    pub action: String,
    /// Damage predicted at commit time, weapon buffs included.
    pub damage: f32,
    pub target_limb: usize,
    pub windup_ticks: u32,
    pub defense: Option<CommittedDefense>,
}

/// Per-creature combat state.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatState {
    /// Scales how much the creature favours vital strikes over caution.
    pub aggression: f32,
    pub body: Body,
    /// Opponents, the first being the primary target.
    pub combatants: Vec<CreatureId>,
    pub incoming: Vec<PendingAttack>,
}

impl Default for CombatState {
    fn default() -> Self {
        Self {
            aggression: 1.0,
            body: Body::humanoid(),
            combatants: Vec::new(),
            incoming: Vec::new(),
        }
    }
}

impl CombatState {
    pub fn add_combatant(&mut self, other: CreatureId) {
        if !self.combatants.contains(&other) {
            self.combatants.push(other);
        }
    }
}
