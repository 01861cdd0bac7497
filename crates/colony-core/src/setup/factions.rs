//! Faction Setup
//!
//! Settlers build, wildlife roams, raiders hunt settlers.

use crate::tasks::{Faction, FactionId, FactionRegistry};

pub const SETTLERS: FactionId = FactionId(0);
pub const WILDLIFE: FactionId = FactionId(1);
pub const RAIDERS: FactionId = FactionId(2);

pub fn create_factions() -> FactionRegistry {
    let mut registry = FactionRegistry::new();
    registry.insert(Faction::new(SETTLERS, "settlers"));
    registry.insert(Faction::new(WILDLIFE, "wildlife"));
    registry.insert(Faction::new(RAIDERS, "raiders"));
    registry.set_hostile(SETTLERS, RAIDERS);
    registry
}
