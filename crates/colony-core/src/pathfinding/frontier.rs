//! Priority Frontier
//!
//! Indexed binary min-heap keyed by cell, with decrease-key. Equal
//! priorities come out in insertion order.

use std::cmp::Ordering;
use thiserror::Error;

use crate::grid::CellId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrontierError {
    #[error("cell {0:?} is already queued")]
    AlreadyQueued(CellId),
    #[error("cell {0:?} is not queued")]
    NotQueued(CellId),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    cell: CellId,
    priority: f32,
    seq: u64,
}

impl Entry {
    fn cmp_key(&self, other: &Entry) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-priority queue over cells supporting `change` (decrease-key).
#[derive(Debug, Default)]
pub struct PriorityFrontier {
    heap: Vec<Entry>,
    /// Heap position of each queued cell, indexed by cell id.
    slots: Vec<Option<usize>>,
    next_seq: u64,
}

impl PriorityFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frontier able to index `cells` cells without reallocating.
    pub fn with_capacity(cells: usize) -> Self {
        Self {
            heap: Vec::new(),
            slots: vec![None; cells],
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.slot(cell).is_some()
    }

    /// Empties the frontier. Insertion order restarts.
    pub fn clear(&mut self) {
        for entry in self.heap.drain(..) {
            self.slots[entry.cell.index()] = None;
        }
        self.next_seq = 0;
    }

    pub fn enqueue(&mut self, cell: CellId, priority: f32) -> Result<(), FrontierError> {
        if self.contains(cell) {
            return Err(FrontierError::AlreadyQueued(cell));
        }
        if cell.index() >= self.slots.len() {
            self.slots.resize(cell.index() + 1, None);
        }
        let entry = Entry {
            cell,
            priority,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.heap.push(entry);
        let at = self.heap.len() - 1;
        self.slots[cell.index()] = Some(at);
        self.sift_up(at);
        Ok(())
    }

    /// Removes and returns the cell with the lowest priority.
    pub fn dequeue(&mut self) -> Option<CellId> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap(0, last);
        let entry = self.heap.pop()?;
        self.slots[entry.cell.index()] = None;
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(entry.cell)
    }

    /// Lowers the priority of a queued cell.
    ///
    /// The cell keeps its original insertion rank for tie-breaking. A higher
    /// priority is accepted and sifted down.
    pub fn change(&mut self, cell: CellId, priority: f32) -> Result<(), FrontierError> {
        let at = self.slot(cell).ok_or(FrontierError::NotQueued(cell))?;
        let previous = self.heap[at].priority;
        self.heap[at].priority = priority;
        if priority <= previous {
            self.sift_up(at);
        } else {
            self.sift_down(at);
        }
        Ok(())
    }

    pub fn priority_of(&self, cell: CellId) -> Option<f32> {
        self.slot(cell).map(|at| self.heap[at].priority)
    }

    fn slot(&self, cell: CellId) -> Option<usize> {
        self.slots.get(cell.index()).copied().flatten()
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.slots[self.heap[a].cell.index()] = Some(a);
        self.slots[self.heap[b].cell.index()] = Some(b);
    }

    fn sift_up(&mut self, mut at: usize) {
        while at > 0 {
            let parent = (at - 1) / 2;
            if self.heap[at].cmp_key(&self.heap[parent]) == Ordering::Less {
                self.swap(at, parent);
                at = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut at: usize) {
        loop {
            let left = 2 * at + 1;
            let right = left + 1;
            let mut smallest = at;
            if left < self.heap.len()
                && self.heap[left].cmp_key(&self.heap[smallest]) == Ordering::Less
            {
                smallest = left;
            }
            if right < self.heap.len()
                && self.heap[right].cmp_key(&self.heap[smallest]) == Ordering::Less
            {
                smallest = right;
            }
            if smallest == at {
                break;
            }
            self.swap(at, smallest);
            at = smallest;
        }
    }
}
