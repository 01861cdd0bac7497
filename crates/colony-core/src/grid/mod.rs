//! Grid world: cells, directions, costs and the shared handle the path
//! worker reads from.

mod direction;
mod topology;

pub use direction::Direction;
pub use topology::{
    Cell, CellId, Coordinates, GridTopology, Mobility, StructureBinding, FLY_COST, IMPASSABLE,
};

use bevy_ecs::prelude::*;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors raised by grid mutation and access.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("cell {0:?} does not exist")]
    UnknownCell(CellId),
    #[error("cell {0:?} has no structure")]
    NoStructure(CellId),
    #[error("grid lock poisoned")]
    LockPoisoned,
}

/// Grid shared between the simulation and the path worker.
///
/// The simulation mutates under the write lock; searches hold the read lock.
#[derive(Resource, Clone, Debug)]
pub struct SharedGrid(Arc<RwLock<GridTopology>>);

impl SharedGrid {
    pub fn new(grid: GridTopology) -> Self {
        Self(Arc::new(RwLock::new(grid)))
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, GridTopology>, GridError> {
        self.0.read().map_err(|_| GridError::LockPoisoned)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, GridTopology>, GridError> {
        self.0.write().map_err(|_| GridError::LockPoisoned)
    }
}
