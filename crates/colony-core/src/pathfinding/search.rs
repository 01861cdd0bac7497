//! Path Search Engine
//!
//! A* over the grid topology. Per-cell transient search state lives in a
//! node table owned by the engine and indexed by cell id. Each search bumps
//! a phase counter by two: a node stamped below the current phase is
//! unvisited, equal is open, above is closed. This makes resetting the table
//! between searches free.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::frontier::{FrontierError, PriorityFrontier};
use crate::grid::{CellId, Coordinates, Direction, GridTopology, Mobility};

/// An immutable request for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathRequest {
    pub from: CellId,
    pub to: CellId,
    pub mobility: Mobility,
}

impl PathRequest {
    pub fn new(from: CellId, to: CellId, mobility: Mobility) -> Self {
        Self { from, to, mobility }
    }
}

/// A found route. `cells` starts at the source and ends at the goal.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub cells: Vec<CellId>,
    pub cost: f32,
}

impl Path {
    pub fn source(&self) -> Option<CellId> {
        self.cells.first().copied()
    }

    pub fn goal(&self) -> Option<CellId> {
        self.cells.last().copied()
    }

    /// Number of steps between source and goal.
    pub fn hops(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }
}

/// Outcome of a search. Unreachability is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum PathResult {
    Found(Path),
    Unreachable,
}

impl PathResult {
    pub fn path(&self) -> Option<&Path> {
        match self {
            PathResult::Found(path) => Some(path),
            PathResult::Unreachable => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PathResult::Found(_))
    }
}

/// Distance estimate used to order the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// Sum of axis distances.
    #[default]
    Manhattan,
    /// Largest axis distance. Admissible on 8-connected grids with costs >= 1.
    Chebyshev,
}

impl Heuristic {
    pub fn estimate(self, from: Coordinates, to: Coordinates) -> f32 {
        match self {
            Heuristic::Manhattan => from.manhattan(to) as f32,
            Heuristic::Chebyshev => from.chebyshev(to) as f32,
        }
    }
}

/// A search that could not run to completion.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("cell {0:?} is not part of the grid")]
    UnknownCell(CellId),
    #[error("frontier corrupted: {0}")]
    Frontier(#[from] FrontierError),
}

#[derive(Debug, Clone, Copy, Default)]
struct SearchNode {
    phase: u32,
    distance: f32,
    heuristic: f32,
    came_from: Option<CellId>,
}

/// Reusable A* engine. Not safe for concurrent searches; the request queue
/// serializes access.
#[derive(Debug)]
pub struct PathSearchEngine {
    phase: u32,
    nodes: Vec<SearchNode>,
    frontier: PriorityFrontier,
    heuristic: Heuristic,
}

impl Default for PathSearchEngine {
    fn default() -> Self {
        Self::new(Heuristic::default())
    }
}

impl PathSearchEngine {
    pub fn new(heuristic: Heuristic) -> Self {
        Self {
            phase: 0,
            nodes: Vec::new(),
            frontier: PriorityFrontier::new(),
            heuristic,
        }
    }

    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }

    /// Current phase stamp. Advances by two per search.
    pub fn phase(&self) -> u32 {
        self.phase
    }

    /// Forgets all transient search state.
    pub fn reset(&mut self) {
        self.nodes.iter_mut().for_each(|n| *n = SearchNode::default());
        self.frontier.clear();
        self.phase = 0;
    }

    fn begin_phase(&mut self, cells: usize) {
        if self.nodes.len() < cells {
            self.nodes.resize(cells, SearchNode::default());
        }
        if self.phase > u32::MAX - 3 {
            self.reset();
        }
        self.phase += 2;
        self.frontier.clear();
    }

    pub fn search(
        &mut self,
        grid: &GridTopology,
        request: &PathRequest,
    ) -> Result<PathResult, SearchError> {
        let goal_at = grid
            .coordinates(request.to)
            .ok_or(SearchError::UnknownCell(request.to))?;
        let source_at = grid
            .coordinates(request.from)
            .ok_or(SearchError::UnknownCell(request.from))?;

        self.begin_phase(grid.len());
        if request.from == request.to {
            return Ok(PathResult::Found(Path {
                cells: vec![request.from],
                cost: 0.0,
            }));
        }

        let open = self.phase;
        let source_estimate = self.heuristic.estimate(source_at, goal_at);
        self.nodes[request.from.index()] = SearchNode {
            phase: open,
            distance: 0.0,
            heuristic: source_estimate,
            came_from: None,
        };
        self.frontier.enqueue(request.from, source_estimate)?;

        while let Some(current) = self.frontier.dequeue() {
            self.nodes[current.index()].phase = open + 1;
            if current == request.to {
                return Ok(PathResult::Found(self.rebuild(request.to)));
            }
            let base = self.nodes[current.index()].distance;

            for direction in Direction::ALL {
                let Some(next) = grid.neighbor(current, direction) else {
                    continue;
                };
                if !grid.pathable(next, request.mobility) {
                    continue;
                }
                let cost = grid.traversal_cost(next, request.mobility);
                if cost < 0.0 {
                    continue;
                }
                let node = self.nodes[next.index()];
                if node.phase > open {
                    continue;
                }

                let distance = base + cost;
                if node.phase < open {
                    let estimate = grid
                        .coordinates(next)
                        .map(|at| self.heuristic.estimate(at, goal_at))
                        .ok_or(SearchError::UnknownCell(next))?;
                    self.nodes[next.index()] = SearchNode {
                        phase: open,
                        distance,
                        heuristic: estimate,
                        came_from: Some(current),
                    };
                    self.frontier.enqueue(next, distance + estimate)?;
                } else if distance < node.distance {
                    let slot = &mut self.nodes[next.index()];
                    slot.distance = distance;
                    slot.came_from = Some(current);
                    self.frontier.change(next, distance + node.heuristic)?;
                }
            }
        }

        Ok(PathResult::Unreachable)
    }

    fn rebuild(&self, goal: CellId) -> Path {
        let cost = self.nodes[goal.index()].distance;
        let mut cells = vec![goal];
        let mut at = goal;
        while let Some(previous) = self.nodes[at.index()].came_from {
            cells.push(previous);
            at = previous;
        }
        cells.reverse();
        Path { cells, cost }
    }
}
