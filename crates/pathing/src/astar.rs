//! Incremental A* search over linked cells.

use std::sync::Arc;

use glam::Vec3;
use nm_geom::{CellId, TriCellMesh};
use tracing::trace;

use crate::{
    heap::NodeId,
    node::{NodeArena, PathNode, SearchState},
    path::MasterPath,
};

/// Part of an existing corridor connecting the start and goal cells of a
/// search.
pub struct CorridorMatch {
    pub path: Arc<MasterPath>,
    /// Index of the start cell in the corridor.
    pub start: usize,
    /// Index of the goal cell in the corridor.
    pub goal: usize,
}

impl CorridorMatch {
    /// Returns true if the whole corridor is matched.
    pub fn is_exact(&self) -> bool {
        self.start == 0 && self.goal == self.path.cells().len() - 1
    }

    pub fn cells(&self) -> &[CellId] {
        &self.path.cells()[self.start..=self.goal]
    }
}

/// A* search between two cells which can be advanced by a bounded number of
/// node expansions at a time.
///
/// Cells are traversed through their centroids except for the start and
/// goal cells which are traversed through the start and goal points. The
/// heuristic is the straight line distance to the goal point.
pub struct AStarSearch {
    max_iterations: usize,
    state: SearchState,
    arena: NodeArena,
    start_cell: CellId,
    goal_cell: CellId,
    goal_point: Vec3,
    goal_node: Option<NodeId>,
}

impl AStarSearch {
    /// # Arguments
    ///
    /// * `max_iterations` - maximum number of nodes expanded during a single
    ///   call to [`Self::process`]. It is raised to 1 if 0 is given.
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            state: SearchState::Uninitialized,
            arena: NodeArena::default(),
            start_cell: CellId::default(),
            goal_cell: CellId::default(),
            goal_point: Vec3::ZERO,
            goal_node: None,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn start_cell(&self) -> CellId {
        self.start_cell
    }

    pub fn goal_cell(&self) -> CellId {
        self.goal_cell
    }

    /// Prepares a new search. Any previous progress is dropped.
    pub fn initialize(
        &mut self,
        start_cell: CellId,
        start_point: Vec3,
        goal_cell: CellId,
        goal_point: Vec3,
    ) {
        self.arena.clear();
        self.start_cell = start_cell;
        self.goal_cell = goal_cell;
        self.goal_point = goal_point;
        self.goal_node = None;

        self.arena.open(PathNode {
            cell: start_cell,
            parent: None,
            position: start_point,
            g: 0.,
            h: start_point.distance(goal_point),
            depth: 1,
            closed: false,
        });
        self.state = SearchState::Initialized;
    }

    /// Looks for a corridor which already connects the start and goal cells
    /// of this search. A corridor going exactly from the start cell to the
    /// goal cell is preferred over a corridor merely passing through them.
    ///
    /// Disposed corridors are ignored.
    pub fn evaluate<'a, I>(&self, paths: I) -> Option<CorridorMatch>
    where
        I: IntoIterator<Item = &'a Arc<MasterPath>>,
    {
        if !self.is_active() {
            return None;
        }

        let mut partial = None;
        for path in paths {
            if path.is_disposed() {
                continue;
            }

            let cells = path.cells();
            if cells[0] == self.start_cell && cells[cells.len() - 1] == self.goal_cell {
                return Some(CorridorMatch {
                    path: Arc::clone(path),
                    start: 0,
                    goal: cells.len() - 1,
                });
            }

            if partial.is_some() {
                continue;
            }
            let Some(start) = path.index_of(self.start_cell) else {
                continue;
            };
            if let Some(offset) = cells[start..].iter().position(|&c| c == self.goal_cell) {
                partial = Some(CorridorMatch {
                    path: Arc::clone(path),
                    start,
                    goal: start + offset,
                });
            }
        }

        partial
    }

    /// Expands up to `max_iterations` nodes and returns the resulting state.
    /// Does nothing if the search is not active.
    pub fn process(&mut self, mesh: &TriCellMesh) -> SearchState {
        if !self.is_active() {
            return self.state;
        }
        self.state = SearchState::Processing;

        for _ in 0..self.max_iterations {
            let Some(id) = self.arena.close_next() else {
                trace!("A* search from {:?} exhausted all cells", self.start_cell);
                self.state = SearchState::Failed;
                break;
            };

            let node = *self.arena.get(id);
            if node.cell == self.goal_cell {
                self.goal_node = Some(id);
                self.state = SearchState::Complete;
                break;
            }

            for neighbour in mesh.cell(node.cell).neighbours() {
                let position = if neighbour == self.goal_cell {
                    self.goal_point
                } else {
                    mesh.cell(neighbour).centroid()
                };
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
                            h: position.distance(self.goal_point),
                            depth: node.depth + 1,
                            closed: false,
                        });
                    }
                }
            }
        }

        self.state
    }

    /// Returns the found corridor, from the start cell to the goal cell. It
    /// is available only once the search is complete.
    pub fn path_cells(&self) -> Option<Vec<CellId>> {
        self.goal_node.map(|id| self.arena.cells_to(id))
    }

    /// Returns the search to the uninitialized state keeping allocated
    /// memory for reuse.
    pub fn reset(&mut self) {
        self.arena.clear();
        self.goal_node = None;
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

    fn run(search: &mut AStarSearch, mesh: &TriCellMesh) -> usize {
        let mut steps = 0;
        while search.is_active() {
            search.process(mesh);
            steps += 1;
        }
        steps
    }

    #[test]
    #[timeout(1000)]
    fn test_find() {
        let mesh = TriCellMesh::grid(4, 4, 1.);
        let mut search = AStarSearch::new(2);
        assert_eq!(search.state(), SearchState::Uninitialized);
        assert_eq!(search.process(&mesh), SearchState::Uninitialized);

        let start = CellId::new(0);
        let goal = CellId::new(31);
        search.initialize(start, Vec3::new(0.7, 0., 0.2), goal, Vec3::new(3.2, 0., 3.8));
        assert_eq!(search.state(), SearchState::Initialized);
        assert_eq!(search.start_cell(), start);
        assert_eq!(search.goal_cell(), goal);
        assert!(search.path_cells().is_none());

        let steps = run(&mut search, &mesh);
        assert!(steps > 1);
        assert_eq!(search.state(), SearchState::Complete);

        let cells = search.path_cells().unwrap();
        assert_eq!(cells[0], start);
        assert_eq!(cells[cells.len() - 1], goal);
        for pair in cells.windows(2) {
            assert!(mesh.cell(pair[0]).link_index(pair[1]).is_some());
        }
        // The shortest possible corridor is a staircase of 8 cells.
        assert!(cells.len() >= 8 && cells.len() <= 12);

        search.reset();
        assert_eq!(search.state(), SearchState::Uninitialized);
        assert!(search.path_cells().is_none());
    }

    #[test]
    fn test_same_cell() {
        let mesh = TriCellMesh::grid(2, 2, 1.);
        let mut search = AStarSearch::new(1);
        let cell = CellId::new(3);
        search.initialize(cell, Vec3::new(1.2, 0., 0.5), cell, Vec3::new(1.1, 0., 0.8));
        assert_eq!(search.process(&mesh), SearchState::Complete);
        assert_eq!(search.path_cells(), Some(vec![cell]));
    }

    #[test]
    #[timeout(1000)]
    fn test_unreachable() {
        let vertices = [
            Vec3::new(0., 0., 0.),
            Vec3::new(1., 0., 0.),
            Vec3::new(1., 0., 1.),
            Vec3::new(5., 0., 5.),
            Vec3::new(6., 0., 5.),
            Vec3::new(6., 0., 6.),
        ];
        let mesh = TriCellMesh::from_triangles(&vertices, &[[0, 1, 2], [3, 4, 5]]).unwrap();
        let mut search = AStarSearch::new(10);
        search.initialize(
            CellId::new(0),
            Vec3::new(0.7, 0., 0.2),
            CellId::new(1),
            Vec3::new(5.7, 0., 5.2),
        );
        run(&mut search, &mesh);
        assert_eq!(search.state(), SearchState::Failed);
        assert!(search.path_cells().is_none());
    }

    #[test]
    fn test_evaluate() {
        let mesh = Arc::new(TriCellMesh::grid(3, 3, 1.));
        let corridor = Arc::new(
            MasterPath::new(1, Arc::clone(&mesh), ids(&[0, 3, 2, 5, 10, 11]), 0.5, 0.1).unwrap(),
        );
        let exact = Arc::new(
            MasterPath::new(2, Arc::clone(&mesh), ids(&[3, 2, 5]), 0.5, 0.1).unwrap(),
        );

        let mut search = AStarSearch::new(10);
        assert!(search.evaluate([&corridor]).is_none());

        search.initialize(CellId::new(3), Vec3::ZERO, CellId::new(5), Vec3::ZERO);
        let found = search.evaluate([&corridor, &exact]).unwrap();
        assert!(found.is_exact());
        assert_eq!(found.path.id(), 2);

        let found = search.evaluate([&corridor]).unwrap();
        assert!(!found.is_exact());
        assert_eq!((found.start, found.goal), (1, 3));
        assert_eq!(found.cells(), ids(&[3, 2, 5]).as_slice());

        exact.dispose();
        assert_eq!(search.evaluate([&exact, &corridor]).unwrap().path.id(), 1);

        // Wrong direction.
        search.initialize(CellId::new(5), Vec3::ZERO, CellId::new(3), Vec3::ZERO);
        assert!(search.evaluate([&corridor]).is_none());
    }
}
