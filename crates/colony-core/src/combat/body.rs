//! Bodies: limbs, the actions they enable, and active buffs.

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Blunt,
    Slash,
    Pierce,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffensiveAction {
    pub name: String,
    pub damage: f32,
    pub damage_type: DamageType,
    /// Reach in cells (Chebyshev).
    pub range: u32,
    /// Ticks between commitment and impact.
    pub windup_ticks: u32,
}

impl OffensiveAction {
    pub fn new(name: impl Into<String>, damage: f32, damage_type: DamageType, range: u32, windup_ticks: u32) -> Self {
        Self {
            name: name.into(),
            damage,
            damage_type,
            range,
            windup_ticks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefenseKind {
    /// Soaks up to `absorb` damage.
    Block { absorb: f32 },
    /// Dexterity contest; see `DodgeRoll`.
    Dodge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefensiveAction {
    pub name: String,
    pub kind: DefenseKind,
}

impl DefensiveAction {
    pub fn new(name: impl Into<String>, kind: DefenseKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Expected damage left over after this defence.
    pub fn residual(&self, incoming: f32, stats: &Stats) -> f32 {
        match self.kind {
            DefenseKind::Block { absorb } => (incoming - absorb).max(0.0),
            DefenseKind::Dodge => incoming * DodgeRoll::expected_multiplier(stats.dexterity),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuffEffect {
    /// Absorbs damage from every hit while active.
    Shield { absorb: f32 },
    /// Adds damage to every attack while active.
    Weapon { bonus: f32 },
}

impl BuffEffect {
    pub fn estimate(&self) -> f32 {
        match *self {
            BuffEffect::Shield { absorb } => absorb,
            BuffEffect::Weapon { bonus } => bonus,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuffAction {
    pub name: String,
    pub effect: BuffEffect,
    pub duration_ticks: u32,
}

impl BuffAction {
    pub fn new(name: impl Into<String>, effect: BuffEffect, duration_ticks: u32) -> Self {
        Self {
            name: name.into(),
            effect,
            duration_ticks,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limb {
    pub name: String,
    pub max_health: f32,
    pub health: f32,
    /// Losing a vital limb is fatal.
    pub vital: bool,
    pub offense: Vec<OffensiveAction>,
    pub defense: Vec<DefensiveAction>,
    pub buffs: Vec<BuffAction>,
    pub busy_ticks: u32,
}

impl Limb {
    pub fn new(name: impl Into<String>, max_health: f32) -> Self {
        Self {
            name: name.into(),
            max_health,
            health: max_health,
            vital: false,
            offense: Vec::new(),
            defense: Vec::new(),
            buffs: Vec::new(),
            busy_ticks: 0,
        }
    }

    pub fn vital(mut self) -> Self {
        self.vital = true;
        self
    }

    pub fn with_attack(mut self, action: OffensiveAction) -> Self {
        self.offense.push(action);
        self
    }

    pub fn with_defense(mut self, action: DefensiveAction) -> Self {
        self.defense.push(action);
        self
    }

    pub fn with_buff(mut self, action: BuffAction) -> Self {
        self.buffs.push(action);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.health > 0.0
    }

    /// Enabled and not committed to an earlier action.
    pub fn is_free(&self) -> bool {
        self.is_enabled() && self.busy_ticks == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub strength: u8,
    pub dexterity: u8,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            strength: 14,
            dexterity: 14,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveBuff {
    pub name: String,
    pub effect: BuffEffect,
    pub remaining_ticks: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub limbs: Vec<Limb>,
    pub stats: Stats,
    pub active_buffs: Vec<ActiveBuff>,
}

impl Default for Body {
    fn default() -> Self {
        Self::humanoid()
    }
}

impl Body {
    /// Torso, a vital head, two arms and two legs.
    pub fn humanoid() -> Self {
        let arm = |side: &str| {
            Limb::new(format!("{side} arm"), 8.0)
                .with_attack(OffensiveAction::new("punch", 4.0, DamageType::Blunt, 1, 1))
                .with_defense(DefensiveAction::new("block", DefenseKind::Block { absorb: 3.0 }))
                .with_buff(BuffAction::new("summon shield", BuffEffect::Shield { absorb: 2.0 }, 10))
                .with_buff(BuffAction::new("summon sword", BuffEffect::Weapon { bonus: 3.0 }, 10))
        };
        let leg = |side: &str| {
            Limb::new(format!("{side} leg"), 12.0)
                .with_defense(DefensiveAction::new("dodge", DefenseKind::Dodge))
        };
        Self {
            limbs: vec![
                Limb::new("torso", 30.0),
                Limb::new("head", 20.0)
                    .vital()
                    .with_attack(OffensiveAction::new("headbutt", 3.0, DamageType::Blunt, 1, 2)),
                arm("left"),
                arm("right"),
                leg("left"),
                leg("right"),
            ],
            stats: Stats::default(),
            active_buffs: Vec::new(),
        }
    }

    pub fn total_health(&self) -> f32 {
        self.limbs.iter().map(|l| l.health.max(0.0)).sum()
    }

    pub fn is_dead(&self) -> bool {
        self.total_health() <= 0.0 || self.limbs.iter().any(|l| l.vital && !l.is_enabled())
    }

    pub fn is_buff_active(&self, name: &str) -> bool {
        self.active_buffs.iter().any(|b| b.name == name)
    }

    pub fn weapon_bonus(&self) -> f32 {
        self.active_buffs
            .iter()
            .map(|b| match b.effect {
                BuffEffect::Weapon { bonus } => bonus,
                BuffEffect::Shield { .. } => 0.0,
            })
            .sum()
    }

    pub fn shield_absorb(&self) -> f32 {
        self.active_buffs
            .iter()
            .map(|b| match b.effect {
                BuffEffect::Shield { absorb } => absorb,
                BuffEffect::Weapon { .. } => 0.0,
            })
            .sum()
    }

    /// Counts down busy limbs and buff durations.
    pub fn tick(&mut self) {
        for limb in &mut self.limbs {
            limb.busy_ticks = limb.busy_ticks.saturating_sub(1);
        }
        for buff in &mut self.active_buffs {
            buff.remaining_ticks = buff.remaining_ticks.saturating_sub(1);
        }
        self.active_buffs.retain(|b| b.remaining_ticks > 0);
    }
}

/// Outcome of a dodge contest, as a damage multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DodgeRoll {
    Critical,
    Success,
    Failure,
    Catastrophe,
}

impl DodgeRoll {
    const TARGET: i32 = 10;

    fn modifier(dexterity: u8) -> i32 {
        (dexterity as i32 - 10) / 2
    }

    fn classify(die: i32, dexterity: u8) -> Self {
        match die {
            20 => DodgeRoll::Critical,
            1 => DodgeRoll::Catastrophe,
            _ if die + Self::modifier(dexterity) >= Self::TARGET => DodgeRoll::Success,
            _ => DodgeRoll::Failure,
        }
    }

    pub fn roll(dexterity: u8, rng: &mut impl Rng) -> Self {
        Self::classify(rng.gen_range(1..=20), dexterity)
    }

    pub fn multiplier(self) -> f32 {
        match self {
            DodgeRoll::Critical => 0.0,
            DodgeRoll::Success => 0.5,
            DodgeRoll::Failure => 1.0,
            DodgeRoll::Catastrophe => 1.5,
        }
    }

    /// Mean multiplier over a fair d20.
    pub fn expected_multiplier(dexterity: u8) -> f32 {
        let total: f32 = (1..=20)
            .map(|die| Self::classify(die, dexterity).multiplier())
            .sum();
        total / 20.0
    }
}
