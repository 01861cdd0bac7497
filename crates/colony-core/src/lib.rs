//! Colony Simulation Library
//!
//! Grid pathfinding on a background worker, faction task pools, depth-first
//! task execution and limb-based combat, wired together as `bevy_ecs`
//! resources and systems.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod clock;
pub mod combat;
pub mod config;
pub mod creatures;
pub mod destroy;
pub mod grid;
pub mod notify;
pub mod pathfinding;
pub mod setup;
pub mod structures;
pub mod systems;
pub mod tasks;

pub use clock::SimClock;
pub use config::{default_config_toml, ConfigError, SimConfig};
pub use setup::{build_world, SetupError};
pub use systems::{build_schedule, RunSummary};

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
