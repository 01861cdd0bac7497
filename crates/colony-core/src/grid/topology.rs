//! Grid Topology
//!
//! Static cell graph with symmetric 8-directional links and per-cell
//! traversal cost. Cells are created once when the map is built and are
//! never destroyed; only their costs change as structures come and go.

use serde::{Deserialize, Serialize};

use super::{Direction, GridError};
use crate::structures::StructureId;

/// Cost sentinel for cells that cannot be entered.
pub const IMPASSABLE: f32 = -1.0;

/// Flat cost reported for flying creatures regardless of terrain.
pub const FLY_COST: f32 = 1.0;

/// Dense index of a cell in its topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Integer grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: i32,
    pub y: i32,
}

impl Coordinates {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Coordinates) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn chebyshev(self, other: Coordinates) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

/// How a creature moves across terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mobility {
    #[default]
    Walk,
    Fly,
}

/// A structure (or blueprint of one) bound to a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructureBinding {
    pub structure: StructureId,
    pub travel_cost: f32,
    /// Blueprints occupy a cell but do not change its cost.
    pub blueprint: bool,
}

/// One cell of the grid.
#[derive(Debug, Clone)]
pub struct Cell {
    pub id: CellId,
    pub coordinates: Coordinates,
    pub terrain_cost: f32,
    pub structure: Option<StructureBinding>,
    neighbors: [Option<CellId>; 8],
}

impl Cell {
    fn new(id: CellId, coordinates: Coordinates, terrain_cost: f32) -> Self {
        Self {
            id,
            coordinates,
            terrain_cost,
            structure: None,
            neighbors: [None; 8],
        }
    }

    /// Walking cost of entering this cell; built structures override terrain.
    pub fn travel_cost(&self) -> f32 {
        match self.structure {
            Some(binding) if !binding.blueprint => binding.travel_cost,
            _ => self.terrain_cost,
        }
    }

    pub fn neighbor(&self, direction: Direction) -> Option<CellId> {
        self.neighbors[direction.index()]
    }
}

/// Rectangular 8-connected cell graph.
#[derive(Debug, Clone)]
pub struct GridTopology {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl GridTopology {
    /// Builds a fully linked `width` x `height` grid with unit terrain cost.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_terrain(width, height, |_| 1.0)
    }

    /// Builds a fully linked grid, asking `terrain` for each cell's cost.
    ///
    /// Cells are numbered row by row starting at `(0, 0)`.
    pub fn with_terrain(width: u32, height: u32, mut terrain: impl FnMut(Coordinates) -> f32) -> Self {
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let id = CellId(cells.len() as u32);
                let coordinates = Coordinates::new(x, y);
                cells.push(Cell::new(id, coordinates, terrain(coordinates)));
            }
        }

        let mut grid = Self { width, height, cells };
        // Linking E, NE, N and NW from every cell covers all eight slots
        // through the symmetric back-link.
        for index in 0..grid.cells.len() {
            let here = grid.cells[index].coordinates;
            for direction in [Direction::E, Direction::NE, Direction::N, Direction::NW] {
                let (dx, dy) = direction.offset();
                if let Some(there) = grid.cell_at(here.x + dx, here.y + dy) {
                    grid.cells[index].neighbors[direction.index()] = Some(there);
                    grid.cells[there.index()].neighbors[direction.opposite().index()] =
                        Some(CellId(index as u32));
                }
            }
        }
        grid
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.index())
    }

    fn cell_mut(&mut self, id: CellId) -> Result<&mut Cell, GridError> {
        self.cells.get_mut(id.index()).ok_or(GridError::UnknownCell(id))
    }

    /// Cell at the given coordinates, if inside the grid.
    pub fn cell_at(&self, x: i32, y: i32) -> Option<CellId> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(CellId((y as u32) * self.width + x as u32))
    }

    pub fn coordinates(&self, id: CellId) -> Option<Coordinates> {
        self.cell(id).map(|c| c.coordinates)
    }

    /// Links `a` to `b` in `direction`, and `b` back to `a` in the opposite one.
    pub fn link(&mut self, a: CellId, direction: Direction, b: CellId) -> Result<(), GridError> {
        self.cell_mut(b)?;
        self.cell_mut(a)?.neighbors[direction.index()] = Some(b);
        self.cell_mut(b)?.neighbors[direction.opposite().index()] = Some(a);
        Ok(())
    }

    /// Removes the link between `a` and its neighbour in `direction`, on both sides.
    pub fn unlink(&mut self, a: CellId, direction: Direction) -> Result<(), GridError> {
        let other = self.cell_mut(a)?.neighbors[direction.index()].take();
        if let Some(b) = other {
            self.cell_mut(b)?.neighbors[direction.opposite().index()] = None;
        }
        Ok(())
    }

    pub fn neighbor(&self, cell: CellId, direction: Direction) -> Option<CellId> {
        self.cell(cell).and_then(|c| c.neighbor(direction))
    }

    /// Linked neighbours of `cell`, in `Direction::ALL` order.
    pub fn neighbors(&self, cell: CellId) -> impl Iterator<Item = CellId> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |d| self.neighbor(cell, d))
    }

    /// Cost of entering `cell` for the given mobility. Negative means impassable.
    pub fn traversal_cost(&self, cell: CellId, mobility: Mobility) -> f32 {
        match (self.cell(cell), mobility) {
            (None, _) => IMPASSABLE,
            (Some(_), Mobility::Fly) => FLY_COST,
            (Some(c), Mobility::Walk) => c.travel_cost(),
        }
    }

    pub fn pathable(&self, cell: CellId, mobility: Mobility) -> bool {
        self.traversal_cost(cell, mobility) >= 0.0
    }

    pub fn set_terrain_cost(&mut self, cell: CellId, cost: f32) -> Result<(), GridError> {
        self.cell_mut(cell)?.terrain_cost = cost;
        Ok(())
    }

    pub fn bind_structure(&mut self, cell: CellId, binding: StructureBinding) -> Result<(), GridError> {
        self.cell_mut(cell)?.structure = Some(binding);
        Ok(())
    }

    /// Turns a blueprint binding into a built structure.
    pub fn complete_structure(&mut self, cell: CellId) -> Result<(), GridError> {
        match self.cell_mut(cell)?.structure.as_mut() {
            Some(binding) => {
                binding.blueprint = false;
                Ok(())
            }
            None => Err(GridError::NoStructure(cell)),
        }
    }

    pub fn clear_structure(&mut self, cell: CellId) -> Result<Option<StructureBinding>, GridError> {
        Ok(self.cell_mut(cell)?.structure.take())
    }

    /// Cells within a square of the given radius around `center`, row by row.
    pub fn cells_within(&self, center: CellId, radius: u32) -> Vec<CellId> {
        let Some(origin) = self.coordinates(center) else {
            return Vec::new();
        };
        let r = radius as i32;
        let mut found = Vec::new();
        for y in origin.y - r..=origin.y + r {
            for x in origin.x - r..=origin.x + r {
                if let Some(id) = self.cell_at(x, y) {
                    found.push(id);
                }
            }
        }
        found
    }

    /// Closest pathable cell to `cell` by ring distance, searching up to `radius`.
    ///
    /// Returns `cell` itself when it is already pathable.
    pub fn nearest_pathable(&self, cell: CellId, mobility: Mobility, radius: u32) -> Option<CellId> {
        let origin = self.coordinates(cell)?;
        for ring in 0..=radius {
            let hit = self
                .cells_within(cell, ring)
                .into_iter()
                .filter(|c| {
                    self.coordinates(*c)
                        .is_some_and(|p| p.chebyshev(origin) == ring)
                })
                .filter(|c| self.pathable(*c, mobility))
                .min_by_key(|c| {
                    self.coordinates(*c)
                        .map(|p| p.manhattan(origin))
                        .unwrap_or(u32::MAX)
                });
            if hit.is_some() {
                return hit;
            }
        }
        None
    }

    /// First pathable linked neighbour of `cell`, in `Direction::ALL` order.
    pub fn pathable_neighbor(&self, cell: CellId, mobility: Mobility) -> Option<CellId> {
        self.neighbors(cell).find(|n| self.pathable(*n, mobility))
    }
}
