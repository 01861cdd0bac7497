//! Pathfinding: priority frontier, A* search engine and the request queue
//! that runs searches off the simulation thread.

pub mod frontier;
pub mod queue;
pub mod search;

pub use frontier::{FrontierError, PriorityFrontier};
pub use queue::{PathHandle, PathPoll, PathRequestQueue, PathWorkerMode};
pub use search::{Heuristic, Path, PathRequest, PathResult, PathSearchEngine, SearchError};
