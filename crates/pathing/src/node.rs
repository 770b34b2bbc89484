//! Search nodes and their arena shared by the incremental searches.

use ahash::AHashMap;
use glam::Vec3;
use nm_geom::CellId;

use crate::heap::{NodeId, TriCellPathNodeHeap};

/// State machine of an incremental search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchState {
    /// The search was created or reset and needs to be initialized.
    Uninitialized,
    /// The search was initialized but not yet processed.
    Initialized,
    /// The search was processed at least once and is not finished.
    Processing,
    Complete,
    Failed,
}

impl SearchState {
    /// Returns true if the search is initialized and not finished yet.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Initialized | Self::Processing)
    }

    /// Returns true if the search is in a terminal state.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// A single visited cell of a search.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PathNode {
    pub(crate) cell: CellId,
    pub(crate) parent: Option<NodeId>,
    /// Position through which the node is traversed: the centroid of the
    /// cell or the start / goal point of the search.
    pub(crate) position: Vec3,
    /// Cost of the path from the start to `position`.
    pub(crate) g: f32,
    /// Estimate of the cost from `position` to the goal.
    pub(crate) h: f32,
    /// Number of cells on the path from the start, including this one.
    pub(crate) depth: u32,
    pub(crate) closed: bool,
}

impl PathNode {
    pub(crate) fn f(&self) -> f32 {
        self.g + self.h
    }
}

/// Visited nodes of a search with a cell lookup and an open list. The arena
/// keeps its allocations when it is cleared.
#[derive(Default)]
pub(crate) struct NodeArena {
    nodes: Vec<PathNode>,
    lookup: AHashMap<CellId, NodeId>,
    open: TriCellPathNodeHeap,
}

impl NodeArena {
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.lookup.clear();
        self.open.clear();
    }

    pub(crate) fn get(&self, id: NodeId) -> &PathNode {
        &self.nodes[id as usize]
    }

    pub(crate) fn find(&self, cell: CellId) -> Option<NodeId> {
        self.lookup.get(&cell).copied()
    }

    /// Adds a new node and pushes it to the open list.
    pub(crate) fn open(&mut self, node: PathNode) -> NodeId {
        // Bounded by the number of cells, which fits u32.
        let id = self.nodes.len() as NodeId;
        self.lookup.insert(node.cell, id);
        self.open.add(id, node.f());
        self.nodes.push(node);
        id
    }

    /// Updates an already opened node with a cheaper path.
    pub(crate) fn reopen(&mut self, id: NodeId, parent: NodeId, g: f32, depth: u32) {
        let node = &mut self.nodes[id as usize];
        debug_assert!(!node.closed);
        node.parent = Some(parent);
        node.g = g;
        node.depth = depth;
        let f = node.f();
        let restacked = self.open.restack(id, f);
        debug_assert!(restacked);
    }

    /// Removes the cheapest node from the open list and marks it as closed.
    pub(crate) fn close_next(&mut self) -> Option<NodeId> {
        let id = self.open.poll()?;
        self.nodes[id as usize].closed = true;
        Some(id)
    }

    /// Returns cells on the path from the start to node `id` (inclusive).
    pub(crate) fn cells_to(&self, id: NodeId) -> Vec<CellId> {
        let mut cells = Vec::with_capacity(self.get(id).depth as usize);
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.get(id);
            cells.push(node.cell);
            current = node.parent;
        }
        cells.reverse();
        cells
    }
}
