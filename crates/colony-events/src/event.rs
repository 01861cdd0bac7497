//! Event Types
//!
//! Notifications emitted by the colony simulation. Every event carries a
//! timestamp, an optional actor snapshot and a tagged payload.

use serde::{Deserialize, Serialize};

use crate::SimTimestamp;

/// Primary event categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Task,
    Path,
    Combat,
    Construction,
    Lifecycle,
}

/// Grid position as it appears in event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Snapshot of a creature at the time of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub creature_id: u64,
    pub name: String,
    pub faction_id: u16,
    pub position: GridPoint,
}

impl ActorSnapshot {
    pub fn new(creature_id: u64, name: impl Into<String>, faction_id: u16, position: GridPoint) -> Self {
        Self {
            creature_id,
            name: name.into(),
            faction_id,
            position,
        }
    }
}

/// Which combat option a creature committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatChoice {
    Offense,
    Defense,
    Buff,
    Advance,
}

/// Event payload, tagged by `kind` in the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    TaskAssigned {
        task: String,
        task_kind: String,
        origin: String,
    },
    TaskCompleted {
        task: String,
        task_kind: String,
    },
    TaskFailed {
        task: String,
        task_kind: String,
        reason: String,
    },
    TaskSuspended {
        task: String,
        task_kind: String,
    },
    TaskReleased {
        task: String,
    },
    TasksRecycled {
        faction: String,
        count: usize,
    },
    PathUnreachable {
        from: GridPoint,
        to: GridPoint,
        attempts: u32,
    },
    CombatDecision {
        choice: CombatChoice,
        action: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<u64>,
        utility: f32,
    },
    AttackResolved {
        attacker: u64,
        limb: String,
        damage: f32,
    },
    AttackDiscarded {
        attacker: u64,
    },
    StructureCompleted {
        structure: String,
        at: GridPoint,
    },
    StructureDemolished {
        structure: String,
        at: GridPoint,
    },
    CreatureDied {
        cause: String,
    },
}

impl EventKind {
    /// Category this payload belongs to.
    pub fn category(&self) -> EventCategory {
        match self {
            EventKind::TaskAssigned { .. }
            | EventKind::TaskCompleted { .. }
            | EventKind::TaskFailed { .. }
            | EventKind::TaskSuspended { .. }
            | EventKind::TaskReleased { .. }
            | EventKind::TasksRecycled { .. } => EventCategory::Task,
            EventKind::PathUnreachable { .. } => EventCategory::Path,
            EventKind::CombatDecision { .. }
            | EventKind::AttackResolved { .. }
            | EventKind::AttackDiscarded { .. } => EventCategory::Combat,
            EventKind::StructureCompleted { .. } | EventKind::StructureDemolished { .. } => {
                EventCategory::Construction
            }
            EventKind::CreatureDied { .. } => EventCategory::Lifecycle,
        }
    }
}

/// A single simulation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier (e.g., "evt_00000042")
    pub event_id: String,
    /// When the event occurred
    pub timestamp: SimTimestamp,
    /// Creature the event is about, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorSnapshot>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(event_id: impl Into<String>, timestamp: SimTimestamp, kind: EventKind) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp,
            actor: None,
            kind,
        }
    }

    pub fn with_actor(mut self, actor: ActorSnapshot) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn category(&self) -> EventCategory {
        self.kind.category()
    }

    /// True when the event concerns the given creature.
    pub fn involves(&self, creature_id: u64) -> bool {
        if self.actor.as_ref().map(|a| a.creature_id) == Some(creature_id) {
            return true;
        }
        match &self.kind {
            EventKind::CombatDecision { target, .. } => *target == Some(creature_id),
            EventKind::AttackResolved { attacker, .. } | EventKind::AttackDiscarded { attacker } => {
                *attacker == creature_id
            }
            _ => false,
        }
    }
}
