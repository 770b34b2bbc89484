//! Bounded Dijkstra search from a single cell towards any of a set of goal
//! cells. It is used to reconnect an agent to an existing corridor.

use ahash::AHashMap;
use glam::Vec3;
use nm_geom::{CellId, TriCellMesh};
use tracing::trace;

use crate::{
    heap::NodeId,
    node::{NodeArena, PathNode, SearchState},
};

/// Order of cells in paths returned by [`DijkstraSearch::path_cells`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchDirection {
    /// From the start cell to the reached goal cell.
    Forward,
    /// From the reached goal cell to the start cell.
    Reverse,
}

pub struct DijkstraSearch {
    max_iterations: usize,
    state: SearchState,
    arena: NodeArena,
    /// Goal cell to index of its first occurrence in the goal list.
    goals: AHashMap<CellId, usize>,
    max_depth: u32,
    direction: SearchDirection,
    /// Reached goal nodes and goal indices in the order of discovery.
    found: Vec<(NodeId, usize)>,
}

impl DijkstraSearch {
    /// # Arguments
    ///
    /// * `max_iterations` - maximum number of nodes expanded during a single
    ///   call to [`Self::process`]. It is raised to 1 if 0 is given.
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            state: SearchState::Uninitialized,
            arena: NodeArena::default(),
            goals: AHashMap::new(),
            max_depth: 1,
            direction: SearchDirection::Forward,
            found: Vec::new(),
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Prepares a new search. Any previous progress is dropped.
    ///
    /// # Arguments
    ///
    /// * `start_cell` - cell the search starts from.
    ///
    /// * `start_point` - point on the start cell.
    ///
    /// * `goal_cells` - search succeeds once it reaches any of these cells.
    ///
    /// * `max_depth` - maximum number of cells on a found path (including
    ///   both the start and the goal cell). Cells deeper than that are not
    ///   explored.
    ///
    /// * `direction` - order of cells in the found paths.
    pub fn initialize(
        &mut self,
        start_cell: CellId,
        start_point: Vec3,
        goal_cells: &[CellId],
        max_depth: u32,
        direction: SearchDirection,
    ) {
        self.arena.clear();
        self.goals.clear();
        self.found.clear();
        for (index, &cell) in goal_cells.iter().enumerate() {
            self.goals.entry(cell).or_insert(index);
        }
        self.max_depth = max_depth.max(1);
        self.direction = direction;

        self.arena.open(PathNode {
            cell: start_cell,
            parent: None,
            position: start_point,
            g: 0.,
            h: 0.,
            depth: 1,
            closed: false,
        });
        self.state = SearchState::Initialized;
    }

    /// Expands up to `max_iterations` nodes and returns the resulting state.
    /// Does nothing if the search is not active.
    ///
    /// Goal cells reached by the search are not expanded any further. The
    /// search completes once all cells within the depth limit are explored.
    pub fn process(&mut self, mesh: &TriCellMesh) -> SearchState {
        if !self.is_active() {
            return self.state;
        }
        self.state = SearchState::Processing;

        for _ in 0..self.max_iterations {
            let Some(id) = self.arena.close_next() else {
                self.state = if self.found.is_empty() {
                    SearchState::Failed
                } else {
                    SearchState::Complete
                };
                trace!(
                    "Dijkstra search finished with {} paths",
                    self.found.len()
                );
                break;
            };

            let node = *self.arena.get(id);
            if let Some(&goal_index) = self.goals.get(&node.cell) {
                self.found.push((id, goal_index));
                continue;
            }
            if node.depth >= self.max_depth {
                continue;
            }

            for neighbour in mesh.cell(node.cell).neighbours() {
                let position = mesh.cell(neighbour).centroid();
                let g = node.g + node.position.distance(position);

                match self.arena.find(neighbour) {
                    Some(other) => {
                        let other_node = self.arena.get(other);
                        if !other_node.closed && g < other_node.g {
                            self.arena.reopen(other, id, g, node.depth + 1);
                        }
                    }
                    None => {
                        self.arena.open(PathNode {
                            cell: neighbour,
                            parent: Some(id),
                            position,
                            g,
                            h: 0.,
                            depth: node.depth + 1,
                            closed: false,
                        });
                    }
                }
            }
        }

        self.state
    }

    /// Number of found paths. Each of them reaches a different goal cell.
    pub fn path_count(&self) -> usize {
        self.found.len()
    }

    /// Returns cells of found path `index` ordered according to the search
    /// direction.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not smaller than [`Self::path_count`].
    pub fn path_cells(&self, index: usize) -> Vec<CellId> {
        let mut cells = self.arena.cells_to(self.found[index].0);
        if self.direction == SearchDirection::Reverse {
            cells.reverse();
        }
        cells
    }

    /// Returns index (into the goal list) of the goal cell reached by path
    /// `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not smaller than [`Self::path_count`].
    pub fn goal_index(&self, index: usize) -> usize {
        self.found[index].1
    }

    /// Returns the search to the uninitialized state keeping allocated
    /// memory for reuse.
    pub fn reset(&mut self) {
        self.arena.clear();
        self.goals.clear();
        self.found.clear();
        self.state = SearchState::Uninitialized;
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;

    use super::*;

    fn ids(cells: &[u32]) -> Vec<CellId> {
        cells.iter().map(|&c| CellId::new(c)).collect()
    }

    fn run(search: &mut DijkstraSearch, mesh: &TriCellMesh) {
        while search.is_active() {
            search.process(mesh);
        }
    }

    #[test]
    #[timeout(1000)]
    fn test_reach_goals() {
        let mesh = TriCellMesh::grid(3, 3, 1.);
        let mut search = DijkstraSearch::new(1);
        // Corridor along the bottom row of the grid.
        let goals = ids(&[1, 0, 3, 2, 5]);
        // Lower-right cell of square (0, 1).
        let start = CellId::new(6);
        search.initialize(start, Vec3::new(0.7, 0., 1.2), &goals, 4, SearchDirection::Forward);
        run(&mut search, &mesh);

        assert_eq!(search.state(), SearchState::Complete);
        assert_eq!(search.path_count(), 2);
        for index in 0..search.path_count() {
            let cells = search.path_cells(index);
            assert!(cells.len() <= 4);
            assert_eq!(cells[0], start);
            assert_eq!(cells[cells.len() - 1], goals[search.goal_index(index)]);
            for pair in cells.windows(2) {
                assert!(mesh.cell(pair[0]).link_index(pair[1]).is_some());
            }
        }

        // Reached goal cells are not expanded thus cell 0 is not reachable.
        assert_eq!(search.goal_index(0), 0);
        assert_eq!(search.goal_index(1), 2);
        assert_eq!(search.path_cells(1), ids(&[6, 9, 8, 3]));
    }

    #[test]
    fn test_reverse() {
        let mesh = TriCellMesh::grid(2, 2, 1.);
        let mut search = DijkstraSearch::new(100);
        search.initialize(
            CellId::new(1),
            Vec3::new(0.2, 0., 0.7),
            &ids(&[3]),
            4,
            SearchDirection::Reverse,
        );
        assert_eq!(search.process(&mesh), SearchState::Complete);
        assert_eq!(search.path_count(), 1);
        assert_eq!(search.goal_index(0), 0);
        assert_eq!(search.path_cells(0), ids(&[3, 0, 1]));
    }

    #[test]
    fn test_depth_limit() {
        let mesh = TriCellMesh::grid(4, 1, 1.);
        let mut search = DijkstraSearch::new(100);
        search.initialize(
            CellId::new(1),
            Vec3::new(0.2, 0., 0.7),
            &ids(&[6, 7]),
            3,
            SearchDirection::Forward,
        );
        assert_eq!(search.process(&mesh), SearchState::Failed);
        assert_eq!(search.path_count(), 0);

        search.reset();
        assert_eq!(search.state(), SearchState::Uninitialized);
        assert_eq!(search.process(&mesh), SearchState::Uninitialized);
    }

    #[test]
    fn test_start_is_goal() {
        let mesh = TriCellMesh::grid(2, 2, 1.);
        let mut search = DijkstraSearch::new(100);
        search.initialize(
            CellId::new(2),
            Vec3::new(1.7, 0., 0.2),
            &ids(&[5, 2, 2]),
            2,
            SearchDirection::Forward,
        );
        assert_eq!(search.process(&mesh), SearchState::Complete);
        assert_eq!(search.path_count(), 1);
        assert_eq!(search.goal_index(0), 1);
        assert_eq!(search.path_cells(0), ids(&[2]));
    }
}
