//! Path search properties over random terrain.

use colony_core::grid::{CellId, GridTopology, Mobility, SharedGrid, IMPASSABLE};
use colony_core::pathfinding::{
    Heuristic, PathPoll, PathRequest, PathRequestQueue, PathResult, PathSearchEngine,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

fn random_grid(rng: &mut SmallRng, width: u32, height: u32) -> GridTopology {
    GridTopology::with_terrain(width, height, |_| match rng.gen_range(0..10) {
        0 | 1 => IMPASSABLE,
        2 => 3.0,
        _ => 1.0,
    })
}

fn unit_cells(grid: &GridTopology) -> Vec<CellId> {
    grid.cells().filter(|c| c.terrain_cost == 1.0).map(|c| c.id).collect()
}

#[derive(PartialEq)]
struct Entry(f32, CellId);

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.total_cmp(&self.0).then_with(|| other.1.cmp(&self.1))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Plain Dijkstra over the same cost model, as a reference.
fn dijkstra(grid: &GridTopology, from: CellId, to: CellId) -> Option<f32> {
    let mut best = vec![f32::INFINITY; grid.len()];
    let mut heap = BinaryHeap::new();
    best[from.index()] = 0.0;
    heap.push(Entry(0.0, from));
    while let Some(Entry(cost, cell)) = heap.pop() {
        if cell == to {
            return Some(cost);
        }
        if cost > best[cell.index()] {
            continue;
        }
        for next in grid.neighbors(cell) {
            if !grid.pathable(next, Mobility::Walk) {
                continue;
            }
            let total = cost + grid.traversal_cost(next, Mobility::Walk);
            if total < best[next.index()] {
                best[next.index()] = total;
                heap.push(Entry(total, next));
            }
        }
    }
    None
}

fn assert_valid_route(grid: &GridTopology, request: &PathRequest, result: &PathResult) {
    let Some(path) = result.path() else {
        return;
    };
    assert_eq!(path.source(), Some(request.from));
    assert_eq!(path.goal(), Some(request.to));
    for pair in path.cells.windows(2) {
        assert!(grid.neighbors(pair[0]).any(|n| n == pair[1]), "{pair:?} not adjacent");
        assert!(grid.pathable(pair[1], request.mobility));
    }
    let summed: f32 = path.cells[1..].iter().map(|c| grid.traversal_cost(*c, request.mobility)).sum();
    assert_eq!(summed, path.cost);
}

#[test]
fn test_costs_match_dijkstra_reference() {
    let mut rng = SmallRng::seed_from_u64(2024);
    let mut engine = PathSearchEngine::new(Heuristic::Chebyshev);
    for _ in 0..20 {
        let grid = random_grid(&mut rng, 16, 12);
        let cells = unit_cells(&grid);
        for _ in 0..10 {
            let from = cells[rng.gen_range(0..cells.len())];
            let to = cells[rng.gen_range(0..cells.len())];
            let request = PathRequest::new(from, to, Mobility::Walk);
            let result = engine.search(&grid, &request).unwrap();
            assert_valid_route(&grid, &request, &result);
            assert_eq!(result.path().map(|p| p.cost), dijkstra(&grid, from, to));
        }
    }
}

#[test]
fn test_manhattan_routes_are_valid() {
    let mut rng = SmallRng::seed_from_u64(77);
    let mut engine = PathSearchEngine::default();
    let grid = random_grid(&mut rng, 20, 20);
    let cells = unit_cells(&grid);
    for _ in 0..50 {
        let from = cells[rng.gen_range(0..cells.len())];
        let to = cells[rng.gen_range(0..cells.len())];
        let request = PathRequest::new(from, to, Mobility::Walk);
        let result = engine.search(&grid, &request).unwrap();
        assert_valid_route(&grid, &request, &result);
        assert_eq!(result.is_found(), dijkstra(&grid, from, to).is_some());
    }
}

#[test]
fn test_reverse_route_costs_the_same() {
    let mut rng = SmallRng::seed_from_u64(9);
    let mut engine = PathSearchEngine::new(Heuristic::Chebyshev);
    let grid = random_grid(&mut rng, 14, 14);
    let cells = unit_cells(&grid);
    for _ in 0..40 {
        let a = cells[rng.gen_range(0..cells.len())];
        let b = cells[rng.gen_range(0..cells.len())];
        let there = engine.search(&grid, &PathRequest::new(a, b, Mobility::Walk)).unwrap();
        let back = engine.search(&grid, &PathRequest::new(b, a, Mobility::Walk)).unwrap();
        assert_eq!(there.path().map(|p| p.cost), back.path().map(|p| p.cost));
    }
}

#[test]
fn test_repeated_search_is_identical() {
    let mut rng = SmallRng::seed_from_u64(31);
    let mut engine = PathSearchEngine::new(Heuristic::Chebyshev);
    let grid = random_grid(&mut rng, 12, 12);
    let cells = unit_cells(&grid);
    let request = PathRequest::new(cells[0], cells[cells.len() - 1], Mobility::Walk);

    let first = engine.search(&grid, &request).unwrap();
    let phase = engine.phase();
    let second = engine.search(&grid, &request).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.phase(), phase + 2);
}

#[test]
fn test_walled_goal_is_unreachable() {
    let grid = GridTopology::with_terrain(7, 7, |c| {
        let ring = (2..=4).contains(&c.x) && (2..=4).contains(&c.y) && !(c.x == 3 && c.y == 3);
        if ring {
            IMPASSABLE
        } else {
            1.0
        }
    });
    let mut engine = PathSearchEngine::default();
    let request = PathRequest::new(grid.cell_at(0, 0).unwrap(), grid.cell_at(3, 3).unwrap(), Mobility::Walk);
    assert_eq!(engine.search(&grid, &request).unwrap(), PathResult::Unreachable);

    // Flyers ignore terrain
    let flying = PathRequest { mobility: Mobility::Fly, ..request };
    assert!(engine.search(&grid, &flying).unwrap().is_found());
}

#[test]
fn test_background_queue_answers_every_request() {
    let mut rng = SmallRng::seed_from_u64(5);
    let grid = random_grid(&mut rng, 16, 16);
    let cells = unit_cells(&grid);
    let shared = SharedGrid::new(grid);
    let mut queue = PathRequestQueue::spawn(shared.clone(), Heuristic::Chebyshev).unwrap();

    let requests: Vec<PathRequest> = (0..25)
        .map(|_| {
            let from = cells[rng.gen_range(0..cells.len())];
            let to = cells[rng.gen_range(0..cells.len())];
            PathRequest::new(from, to, Mobility::Walk)
        })
        .collect();
    let handles: Vec<_> = requests.iter().map(|r| queue.submit(*r)).collect();

    let mut engine = PathSearchEngine::new(Heuristic::Chebyshev);
    for (request, handle) in requests.iter().zip(&handles) {
        let answer = handle.wait();
        assert_eq!(queue.poll(handle), PathPoll::Ready(answer.clone()));
        let grid = shared.read().unwrap();
        let expected = engine.search(&grid, request).unwrap();
        assert_eq!(answer.path().map(|p| p.cost), expected.path().map(|p| p.cost));
    }
    assert_eq!(queue.submitted(), 25);
}
