//! Jobs are the internal, owner thread side, counterparts of navigation
//! requests.

use glam::Vec3;

use crate::{
    astar::AStarSearch, dijkstra::DijkstraSearch, path::Path, request::NavRequest,
};

/// Reusable job state which can be returned to its initial state.
pub(crate) trait Reusable {
    fn reset(&mut self);
}

impl Reusable for AStarSearch {
    fn reset(&mut self) {
        AStarSearch::reset(self);
    }
}

impl Reusable for DijkstraSearch {
    fn reset(&mut self) {
        DijkstraSearch::reset(self);
    }
}

/// Bounded pool of reusable job state.
pub(crate) struct JobPool<T: Reusable> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: Reusable> JobPool<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn take(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Resets an item and keeps it for later reuse if there is room in the
    /// pool. Returns false if the item was dropped.
    pub(crate) fn give(&mut self, mut item: T) -> bool {
        if self.items.len() >= self.capacity {
            return false;
        }
        item.reset();
        self.items.push(item);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}

/// Search for a new corridor.
pub(crate) struct PathJob {
    pub(crate) request: NavRequest<Path>,
    /// Start point, moved onto the mesh once the job is initialized.
    pub(crate) start: Vec3,
    /// Goal point, moved onto the mesh once the job is initialized.
    pub(crate) goal: Vec3,
    pub(crate) search: AStarSearch,
}

/// Search reconnecting a new start point to an existing corridor.
pub(crate) struct RepairJob {
    pub(crate) request: NavRequest<Path>,
    pub(crate) start: Vec3,
    pub(crate) source: Path,
    pub(crate) search: DijkstraSearch,
}

pub(crate) struct LocationJob {
    pub(crate) request: NavRequest<Vec3>,
    pub(crate) point: Vec3,
}

pub(crate) struct ValidityJob {
    pub(crate) request: NavRequest<bool>,
    pub(crate) point: Vec3,
    pub(crate) y_tolerance: f32,
}
