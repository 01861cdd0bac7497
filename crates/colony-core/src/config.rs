//! Simulation configuration.
//!
//! All tunables are loaded from a TOML file. Every section falls back to
//! its defaults, so a file only needs the values it changes.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::pathfinding::{Heuristic, PathWorkerMode};

/// Complete simulation configuration.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub pathfinding: PathfindingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
    #[serde(default)]
    pub agents: AgentConfig,
    #[serde(default)]
    pub combat: CombatConfig,
}

impl SimConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rejects values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.width == 0 || self.world.height == 0 {
            return Err(ConfigError::Invalid("world dimensions must be non-zero".into()));
        }
        if self.simulation.minutes_per_tick == 0 {
            return Err(ConfigError::Invalid("minutes_per_tick must be at least 1".into()));
        }
        let (low, high) = self.scheduler.idle_wait_minutes;
        if low > high {
            return Err(ConfigError::Invalid(format!("idle_wait_minutes range {low}..{high} is empty")));
        }
        for (name, chance) in [
            ("world.obstacle_density", self.world.obstacle_density),
            ("world.rough_density", self.world.rough_density),
            ("scheduler.idle_wander_chance", self.scheduler.idle_wander_chance),
            ("agents.roam_chance", self.agents.roam_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(ConfigError::Invalid(format!("{name} must be within 0..=1, got {chance}")));
            }
        }
        if self.combat.default_aggression <= 0.0 {
            return Err(ConfigError::Invalid("combat.default_aggression must be positive".into()));
        }
        Ok(())
    }
}

/// Run length and clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub ticks: u64,
    /// Simulated minutes per tick
    pub minutes_per_tick: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            ticks: 2000,
            minutes_per_tick: 1,
        }
    }
}

/// Map generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: u32,
    pub height: u32,
    /// Share of cells that are impassable rock
    pub obstacle_density: f64,
    /// Share of cells that are slow to cross
    pub rough_density: f64,
    pub rough_cost: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 48,
            height: 32,
            obstacle_density: 0.08,
            rough_density: 0.1,
            rough_cost: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    pub worker: PathWorkerMode,
    pub heuristic: Heuristic,
    /// Unreachable answers a move tolerates before giving up
    pub max_unreachable_attempts: u32,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            worker: PathWorkerMode::Background,
            heuristic: Heuristic::Manhattan,
            max_unreachable_attempts: 3,
        }
    }
}

/// Faction task pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ticks between faction pool updates
    pub update_interval_ticks: u64,
    pub recycle_interval_hours: u64,
    /// Failed tasks cleared per recycle pass
    pub recycle_batch: usize,
    /// Wake suspended tasks in the pool once their recheck time passes
    pub auto_resume: bool,
    /// Priority of a task whose skill the creature lacks
    pub unskilled_priority: u32,
    pub idle_wander_chance: f64,
    pub idle_wander_radius: u32,
    /// Inclusive range an idle rest lasts, in minutes
    pub idle_wait_minutes: (u64, u64),
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval_ticks: 10,
            recycle_interval_hours: 1,
            recycle_batch: 8,
            auto_resume: true,
            unskilled_priority: 5,
            idle_wander_chance: 0.4,
            idle_wander_radius: 2,
            idle_wait_minutes: (60, 120),
        }
    }
}

/// Task execution tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub suspend_recheck_minutes: u64,
    /// Cells a creature may cover in one tick, whatever its speed
    pub max_move_speed: f32,
    pub rest_energy_per_tick: f32,
    pub rest_minutes: u64,
    pub build_work_per_level: f32,
    /// Search radius for firm ground after a failure strands a creature
    pub unstuck_radius: u32,
    /// Time spent taking a structure apart once on site
    pub removal_minutes: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            suspend_recheck_minutes: 30,
            max_move_speed: 2.0,
            rest_energy_per_tick: 2.0,
            rest_minutes: 240,
            build_work_per_level: 1.0,
            unstuck_radius: 10,
            removal_minutes: 20,
        }
    }
}

/// Population and creature needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub settlers: usize,
    pub grazers: usize,
    pub raiders: usize,
    /// Blueprints placed for the settlers at start
    pub blueprints: usize,
    /// Rubble heaps the settlers are ordered to clear
    pub rubble: usize,
    pub tired_threshold: f32,
    pub energy_decay_per_tick: f32,
    pub roam_chance: f64,
    pub roam_radius: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            settlers: 6,
            grazers: 4,
            raiders: 2,
            blueprints: 4,
            rubble: 2,
            tired_threshold: 15.0,
            energy_decay_per_tick: 0.05,
            roam_chance: 0.2,
            roam_radius: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Ticks a limb stays committed after acting
    pub limb_busy_ticks: u32,
    pub decision_interval_ticks: u64,
    pub engage_radius: u32,
    pub disengage_radius: u32,
    pub default_aggression: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            limb_busy_ticks: 2,
            decision_interval_ticks: 1,
            engage_radius: 3,
            disengage_radius: 8,
            default_aggression: 1.0,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# Colony Simulation Configuration

[simulation]
seed = 42
ticks = 2000
minutes_per_tick = 1

[world]
width = 48
height = 32
obstacle_density = 0.08
rough_density = 0.1
rough_cost = 3.0

[pathfinding]
# "background" runs searches on a worker thread, "inline" on submit
worker = "background"
# "manhattan" or "chebyshev"
heuristic = "manhattan"
max_unreachable_attempts = 3

[scheduler]
update_interval_ticks = 10
recycle_interval_hours = 1
recycle_batch = 8
auto_resume = true
unskilled_priority = 5
idle_wander_chance = 0.4
idle_wander_radius = 2
idle_wait_minutes = [60, 120]

[tasks]
suspend_recheck_minutes = 30
max_move_speed = 2.0
rest_energy_per_tick = 2.0
rest_minutes = 240
build_work_per_level = 1.0
unstuck_radius = 10
removal_minutes = 20

[agents]
settlers = 6
grazers = 4
raiders = 2
blueprints = 4
rubble = 2
tired_threshold = 15.0
energy_decay_per_tick = 0.05
roam_chance = 0.2
roam_radius = 10

[combat]
limb_busy_ticks = 2
decision_interval_ticks = 1
engage_radius = 3
disengage_radius = 8
default_aggression = 1.0
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_toml_matches_defaults() {
        let parsed = SimConfig::from_str(&default_config_toml()).unwrap();
        assert_eq!(parsed, SimConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = SimConfig::from_str(
            r#"
[simulation]
seed = 7

[pathfinding]
worker = "inline"
"#,
        )
        .unwrap();
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.simulation.ticks, 2000);
        assert_eq!(config.pathfinding.worker, PathWorkerMode::Inline);
        assert_eq!(config.scheduler.unskilled_priority, 5);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = SimConfig::default();
        config.scheduler.idle_wait_minutes = (10, 20);
        config.pathfinding.heuristic = Heuristic::Chebyshev;
        let text = config.to_toml().unwrap();
        assert_eq!(SimConfig::from_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let empty_world = "[world]\nwidth = 0\n";
        assert!(matches!(SimConfig::from_str(empty_world), Err(ConfigError::Invalid(_))));

        let bad_range = "[scheduler]\nidle_wait_minutes = [90, 30]\n";
        assert!(matches!(SimConfig::from_str(bad_range), Err(ConfigError::Invalid(_))));

        let bad_chance = "[agents]\nroam_chance = 1.5\n";
        assert!(matches!(SimConfig::from_str(bad_chance), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        assert!(matches!(SimConfig::from_str("[simulation"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.toml");
        std::fs::write(&path, "[agents]\nsettlers = 2\n").unwrap();
        let config = SimConfig::from_file(&path).unwrap();
        assert_eq!(config.agents.settlers, 2);
        assert!(SimConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
