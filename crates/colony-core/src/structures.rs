//! Structures and blueprints.
//!
//! A blueprint claims a cell without changing its cost. Completing it turns
//! the binding into a built structure whose travel cost overrides terrain.

use bevy_ecs::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::grid::{CellId, GridError, GridTopology, StructureBinding};
use crate::tasks::FactionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructureId(pub u32);

/// A structure waiting to be built.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub id: StructureId,
    pub name: String,
    pub cell: CellId,
    pub faction: FactionId,
    /// Cost the finished structure imposes on walkers.
    pub travel_cost: f32,
    pub work_required: f32,
    pub work_done: f32,
}

impl Blueprint {
    pub fn is_complete(&self) -> bool {
        self.work_done >= self.work_required
    }
}

#[derive(Debug, Clone)]
pub struct Structure {
    pub id: StructureId,
    pub name: String,
    pub cell: CellId,
    pub faction: FactionId,
}

/// What a demolition removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Demolished {
    pub id: StructureId,
    pub name: String,
    pub cell: CellId,
}

#[derive(Resource, Debug, Default)]
pub struct StructureRegistry {
    blueprints: BTreeMap<StructureId, Blueprint>,
    structures: BTreeMap<StructureId, Structure>,
    /// Built structures their faction wants torn down.
    marked_for_removal: BTreeSet<StructureId>,
    next_id: u32,
}

impl StructureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a blueprint and binds it to its cell.
    pub fn place_blueprint(
        &mut self,
        grid: &mut GridTopology,
        name: impl Into<String>,
        cell: CellId,
        faction: FactionId,
        travel_cost: f32,
        work_required: f32,
    ) -> Result<StructureId, GridError> {
        let id = StructureId(self.next_id);
        grid.bind_structure(
            cell,
            StructureBinding {
                structure: id,
                travel_cost,
                blueprint: true,
            },
        )?;
        self.next_id += 1;
        self.blueprints.insert(
            id,
            Blueprint {
                id,
                name: name.into(),
                cell,
                faction,
                travel_cost,
                work_required,
                work_done: 0.0,
            },
        );
        Ok(id)
    }

    /// Registers an already standing structure, e.g. rubble on a fresh map.
    pub fn place_structure(
        &mut self,
        grid: &mut GridTopology,
        name: impl Into<String>,
        cell: CellId,
        faction: FactionId,
        travel_cost: f32,
    ) -> Result<StructureId, GridError> {
        let id = StructureId(self.next_id);
        grid.bind_structure(
            cell,
            StructureBinding {
                structure: id,
                travel_cost,
                blueprint: false,
            },
        )?;
        self.next_id += 1;
        self.structures.insert(
            id,
            Structure {
                id,
                name: name.into(),
                cell,
                faction,
            },
        );
        Ok(id)
    }

    pub fn blueprint(&self, id: StructureId) -> Option<&Blueprint> {
        self.blueprints.get(&id)
    }

    pub fn blueprint_mut(&mut self, id: StructureId) -> Option<&mut Blueprint> {
        self.blueprints.get_mut(&id)
    }

    /// Blueprints owned by a faction, in id order.
    pub fn blueprints_of(&self, faction: FactionId) -> impl Iterator<Item = &Blueprint> {
        self.blueprints.values().filter(move |b| b.faction == faction)
    }

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    pub fn structures(&self) -> impl Iterator<Item = &Structure> {
        self.structures.values()
    }

    /// Flags a built structure for removal. False if there is no such
    /// structure.
    pub fn mark_for_removal(&mut self, id: StructureId) -> bool {
        if !self.structures.contains_key(&id) {
            return false;
        }
        self.marked_for_removal.insert(id);
        true
    }

    pub fn is_marked_for_removal(&self, id: StructureId) -> bool {
        self.marked_for_removal.contains(&id)
    }

    /// Structures of a faction flagged for removal, in id order.
    pub fn marked_for_removal_of(&self, faction: FactionId) -> impl Iterator<Item = &Structure> {
        self.marked_for_removal
            .iter()
            .filter_map(|id| self.structures.get(id))
            .filter(move |s| s.faction == faction)
    }

    /// Turns a blueprint into a built structure.
    pub fn complete(&mut self, grid: &mut GridTopology, id: StructureId) -> Result<Option<&Structure>, GridError> {
        let Some(blueprint) = self.blueprints.remove(&id) else {
            return Ok(None);
        };
        grid.complete_structure(blueprint.cell)?;
        let structure = Structure {
            id,
            name: blueprint.name,
            cell: blueprint.cell,
            faction: blueprint.faction,
        };
        Ok(Some(self.structures.entry(id).or_insert(structure)))
    }

    /// Removes a blueprint or structure and frees its cell. The registry is
    /// left untouched when the grid refuses.
    pub fn demolish(&mut self, grid: &mut GridTopology, id: StructureId) -> Result<Option<Demolished>, GridError> {
        let (name, cell) = match (self.blueprints.get(&id), self.structures.get(&id)) {
            (Some(b), _) => (b.name.clone(), b.cell),
            (None, Some(s)) => (s.name.clone(), s.cell),
            (None, None) => return Ok(None),
        };
        grid.clear_structure(cell)?;
        self.blueprints.remove(&id);
        self.structures.remove(&id);
        self.marked_for_removal.remove(&id);
        Ok(Some(Demolished { id, name, cell }))
    }
}
