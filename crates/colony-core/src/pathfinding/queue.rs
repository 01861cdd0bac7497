//! Path Request Queue
//!
//! Non-blocking boundary between the simulation and the search engine.
//! Requests are resolved strictly in submission order by a single worker
//! thread; callers poll their handle on later ticks.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error};

use super::search::{Heuristic, PathRequest, PathResult, PathSearchEngine};
use crate::grid::SharedGrid;

/// Where searches run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathWorkerMode {
    /// One background thread drains the queue.
    #[default]
    Background,
    /// Searches resolve inside `submit`. Deterministic; used by tests.
    Inline,
}

/// State of a submitted request.
#[derive(Debug, Clone, PartialEq)]
pub enum PathPoll {
    Pending,
    Ready(PathResult),
}

#[derive(Debug, Default)]
struct Slot {
    result: Mutex<Option<PathResult>>,
    filled: Condvar,
}

/// Caller-side handle to a submitted request.
#[derive(Debug, Clone)]
pub struct PathHandle {
    request: PathRequest,
    slot: Arc<Slot>,
}

impl PathHandle {
    fn new(request: PathRequest) -> Self {
        Self {
            request,
            slot: Arc::new(Slot::default()),
        }
    }

    pub fn request(&self) -> &PathRequest {
        &self.request
    }

    pub fn poll(&self) -> PathPoll {
        match self.slot.result.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(result) => PathPoll::Ready(result.clone()),
                None => PathPoll::Pending,
            },
            // The worker only panics mid-write if the search itself panicked
            Err(_) => PathPoll::Ready(PathResult::Unreachable),
        }
    }

    /// Blocks until the request resolves.
    pub fn wait(&self) -> PathResult {
        let Ok(mut guard) = self.slot.result.lock() else {
            return PathResult::Unreachable;
        };
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            guard = match self.slot.filled.wait(guard) {
                Ok(guard) => guard,
                Err(_) => return PathResult::Unreachable,
            };
        }
    }

    fn fill(&self, result: PathResult) {
        if let Ok(mut guard) = self.slot.result.lock() {
            *guard = Some(result);
        }
        self.slot.filled.notify_all();
    }
}

enum Backend {
    Background {
        sender: Option<Sender<PathHandle>>,
        worker: Option<JoinHandle<()>>,
    },
    Inline {
        grid: SharedGrid,
        engine: PathSearchEngine,
    },
}

/// Resource owning the search engine and its worker.
#[derive(Resource)]
pub struct PathRequestQueue {
    backend: Backend,
    submitted: u64,
}

impl PathRequestQueue {
    /// Starts the background worker.
    pub fn spawn(grid: SharedGrid, heuristic: Heuristic) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("path-search".into())
            .spawn(move || run_worker(grid, PathSearchEngine::new(heuristic), receiver))?;
        Ok(Self {
            backend: Backend::Background {
                sender: Some(sender),
                worker: Some(worker),
            },
            submitted: 0,
        })
    }

    /// Resolves every request synchronously inside `submit`.
    pub fn inline(grid: SharedGrid, heuristic: Heuristic) -> Self {
        Self {
            backend: Backend::Inline {
                grid,
                engine: PathSearchEngine::new(heuristic),
            },
            submitted: 0,
        }
    }

    pub fn with_mode(mode: PathWorkerMode, grid: SharedGrid, heuristic: Heuristic) -> std::io::Result<Self> {
        match mode {
            PathWorkerMode::Background => Self::spawn(grid, heuristic),
            PathWorkerMode::Inline => Ok(Self::inline(grid, heuristic)),
        }
    }

    pub fn mode(&self) -> PathWorkerMode {
        match self.backend {
            Backend::Background { .. } => PathWorkerMode::Background,
            Backend::Inline { .. } => PathWorkerMode::Inline,
        }
    }

    /// Total requests submitted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Enqueues a request and returns immediately.
    ///
    /// In inline mode the caller must not hold the grid's write lock.
    pub fn submit(&mut self, request: PathRequest) -> PathHandle {
        self.submitted += 1;
        let handle = PathHandle::new(request);
        match &mut self.backend {
            Backend::Background { sender, .. } => {
                let delivered = sender
                    .as_ref()
                    .map(|s| s.send(handle.clone()).is_ok())
                    .unwrap_or(false);
                if !delivered {
                    error!(?request, "path worker is gone, resolving as unreachable");
                    handle.fill(PathResult::Unreachable);
                }
            }
            Backend::Inline { grid, engine } => {
                handle.fill(resolve(grid, engine, &request));
            }
        }
        handle
    }

    pub fn poll(&self, handle: &PathHandle) -> PathPoll {
        handle.poll()
    }
}

impl Drop for PathRequestQueue {
    fn drop(&mut self) {
        if let Backend::Background { sender, worker } = &mut self.backend {
            sender.take();
            if let Some(worker) = worker.take() {
                if worker.join().is_err() {
                    error!("path worker panicked");
                }
            }
        }
    }
}

fn run_worker(grid: SharedGrid, mut engine: PathSearchEngine, receiver: Receiver<PathHandle>) {
    debug!("path worker started");
    for handle in receiver {
        let result = resolve(&grid, &mut engine, &handle.request);
        handle.fill(result);
    }
    debug!("path worker stopped");
}

fn resolve(grid: &SharedGrid, engine: &mut PathSearchEngine, request: &PathRequest) -> PathResult {
    let topology = match grid.read() {
        Ok(topology) => topology,
        Err(err) => {
            error!(?request, %err, "cannot read grid for path search");
            return PathResult::Unreachable;
        }
    };
    match engine.search(&topology, request) {
        Ok(result) => result,
        Err(err) => {
            error!(?request, %err, "path search aborted");
            engine.reset();
            PathResult::Unreachable
        }
    }
}
