//! Corridors of linked cells and the string pulling over them.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use glam::Vec3;
use nm_geom::{
    geometry::{
        is_at_or_left, is_at_or_right, signed_area_x2, xz_distance_squared, xz_equal,
        TOLERANCE_STD,
    },
    CellId, TriCellMesh,
};
use thiserror::Error;

/// Maximum allowed corner offset factor.
pub const MAX_OFFSET_FACTOR: f32 = 0.5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("a path needs at least one cell")]
    Empty,
    #[error("cells at index {index} and {} are not linked", index + 1)]
    NotAdjacent { index: usize },
}

/// A corridor: a sequence of linked cells shared by any number of
/// [`Path`]s.
pub struct MasterPath {
    id: u64,
    mesh: Arc<TriCellMesh>,
    cells: Vec<CellId>,
    /// Portal `i` is the wall shared by cells `i` and `i + 1` as seen when
    /// travelling from the start to the goal.
    portals: Vec<Portal>,
    plane_tolerance: f32,
    offset_factor: f32,
    disposed: AtomicBool,
}

impl MasterPath {
    /// Creates a new corridor.
    ///
    /// # Arguments
    ///
    /// * `id` - identifier of the corridor, unique within a navigator.
    ///
    /// * `mesh` - mesh the cells belong to.
    ///
    /// * `cells` - non-empty sequence of cells where each two consecutive
    ///   cells are linked.
    ///
    /// * `plane_tolerance` - maximum height difference between a point and a
    ///   cell plane for the point to be considered on the cell.
    ///
    /// * `offset_factor` - how far (relative to the wall length) are funnel
    ///   corners moved away from wall end points. It is clamped to the range
    ///   from 0 to [`MAX_OFFSET_FACTOR`].
    pub fn new(
        id: u64,
        mesh: Arc<TriCellMesh>,
        cells: Vec<CellId>,
        plane_tolerance: f32,
        offset_factor: f32,
    ) -> Result<Self, PathError> {
        if cells.is_empty() {
            return Err(PathError::Empty);
        }

        let mut portals = Vec::with_capacity(cells.len() - 1);
        for (index, pair) in cells.windows(2).enumerate() {
            let cell = mesh.cell(pair[0]);
            let wall = cell
                .link_index(pair[1])
                .ok_or(PathError::NotAdjacent { index })?;
            let (a, b) = cell.wall(wall);
            let midpoint = a.lerp(b, 0.5);
            portals.push(if signed_area_x2(cell.centroid(), midpoint, a) > 0. {
                Portal { left: a, right: b }
            } else {
                Portal { left: b, right: a }
            });
        }

        Ok(Self {
            id,
            mesh,
            cells,
            portals,
            plane_tolerance,
            offset_factor: offset_factor.clamp(0., MAX_OFFSET_FACTOR),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mesh(&self) -> &Arc<TriCellMesh> {
        &self.mesh
    }

    pub fn cells(&self) -> &[CellId] {
        self.cells.as_slice()
    }

    pub fn start_cell(&self) -> CellId {
        self.cells[0]
    }

    pub fn goal_cell(&self) -> CellId {
        self.cells[self.cells.len() - 1]
    }

    pub fn plane_tolerance(&self) -> f32 {
        self.plane_tolerance
    }

    pub fn offset_factor(&self) -> f32 {
        self.offset_factor
    }

    /// Returns index of the first occurrence of a cell in the corridor.
    pub fn index_of(&self, cell: CellId) -> Option<usize> {
        self.cells.iter().position(|&c| c == cell)
    }

    /// Creates a new path following this corridor to `goal`. The goal should
    /// lie on the last cell of the corridor.
    pub fn path(self: &Arc<Self>, goal: Vec3) -> Path {
        Path {
            master: Arc::clone(self),
            goal,
            last_cell_index: 0,
        }
    }

    /// Marks the corridor as no longer maintained by its navigator. A
    /// disposed corridor still answers geometric queries.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Returns index of a corridor cell on which the point lies, i.e. whose
    /// column contains the point and whose plane is within the plane
    /// tolerance from the point.
    ///
    /// Cell at index `hint` is tested first, followed by the cells after it
    /// and finally the cells before it.
    pub fn cell_index_for_position(&self, point: Vec3, hint: usize) -> Option<usize> {
        let hint = hint.min(self.cells.len() - 1);
        (hint..self.cells.len())
            .chain(0..hint)
            .find(|&index| self.is_on_cell(index, point))
    }

    /// Returns the point of the corridor surface closest to `point`.
    pub fn force_to_path(&self, point: Vec3) -> Vec3 {
        self.mesh
            .closest_cell(point, self.cells.iter().copied())
            .map_or(point, |(_, on_cell)| on_cell)
    }

    /// Returns `point` with y moved onto the corridor surface, choosing the
    /// cell plane closest to the original height. Returns None if the point
    /// is outside of the corridor column.
    pub fn force_y_to_path(&self, point: Vec3) -> Option<Vec3> {
        self.cells
            .iter()
            .map(|&id| self.mesh.cell(id))
            .filter(|cell| cell.is_in_column(point.x, point.z))
            .map(|cell| cell.plane_y(point.x, point.z))
            .min_by(|a, b| (a - point.y).abs().total_cmp(&(b - point.y).abs()))
            .map(|y| Vec3::new(point.x, y, point.z))
    }

    /// Returns true if (x, z) lies in the column of any cell of the corridor.
    pub fn is_in_path_column(&self, x: f32, z: f32) -> bool {
        self.cells
            .iter()
            .any(|&id| self.mesh.cell(id).is_in_column(x, z))
    }

    fn is_on_cell(&self, index: usize, point: Vec3) -> bool {
        let cell = self.mesh.cell(self.cells[index]);
        cell.is_in_column(point.x, point.z)
            && (cell.plane_y(point.x, point.z) - point.y).abs() <= self.plane_tolerance
    }

    /// Returns the farthest point visible from `from` along the corridor
    /// towards `goal`. `from` must lie on cell at index `start`.
    fn target(&self, start: usize, from: Vec3, goal: Vec3) -> Vec3 {
        let last = self.cells.len() - 1;

        // The apex lying on a portal end point gives no usable funnel, the
        // portal is skipped.
        let mut index = start;
        loop {
            if index == last {
                return goal;
            }
            let portal = self.portals[index];
            if !xz_equal(from, portal.left) && !xz_equal(from, portal.right) {
                break;
            }
            index += 1;
        }

        let apex = from;
        let mut left = self.portals[index].left;
        let mut left_index = index;
        let mut right = self.portals[index].right;
        let mut right_index = index;

        for next in index + 1..=last {
            let portal = if next == last {
                Portal {
                    left: goal,
                    right: goal,
                }
            } else {
                self.portals[next]
            };

            if is_at_or_left(apex, right, portal.right) {
                if xz_equal(apex, right) || is_at_or_right(apex, left, portal.right) {
                    right = portal.right;
                    right_index = next;
                } else {
                    return self.corner(apex, left, left_index, goal);
                }
            }

            if is_at_or_right(apex, left, portal.left) {
                if xz_equal(apex, left) || is_at_or_left(apex, right, portal.left) {
                    left = portal.left;
                    left_index = next;
                } else {
                    return self.corner(apex, right, right_index, goal);
                }
            }
        }

        goal
    }

    /// Returns funnel corner at `vertex` of portal `index` moved towards the
    /// other end of the portal.
    fn corner(&self, apex: Vec3, vertex: Vec3, index: usize, goal: Vec3) -> Vec3 {
        if index == self.portals.len() {
            return goal;
        }

        let portal = self.portals[index];
        let other = if xz_equal(vertex, portal.left) {
            portal.right
        } else {
            portal.left
        };

        let corner = vertex + (other - vertex) * self.offset_factor;
        if xz_distance_squared(apex, corner) <= TOLERANCE_STD * TOLERANCE_STD {
            vertex
        } else {
            corner
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Portal {
    left: Vec3,
    right: Vec3,
}

/// A path to a goal following a (shared) corridor.
///
/// The path remembers the corridor cell it was last queried at which makes
/// consecutive queries from nearby positions cheap.
#[derive(Clone)]
pub struct Path {
    master: Arc<MasterPath>,
    goal: Vec3,
    last_cell_index: usize,
}

impl Path {
    /// Returns the farthest point towards the goal directly reachable from
    /// `from` while staying in the corridor.
    ///
    /// Returns None if `from` does not lie on the corridor.
    pub fn get_target(&mut self, from: Vec3) -> Option<Vec3> {
        let index = self
            .master
            .cell_index_for_position(from, self.last_cell_index)?;
        self.last_cell_index = index;
        Some(self.master.target(index, from, self.goal))
    }

    /// See [`MasterPath::force_to_path`].
    pub fn force_to_path(&self, point: Vec3) -> Vec3 {
        self.master.force_to_path(point)
    }

    /// See [`MasterPath::force_y_to_path`].
    pub fn force_y_to_path(&self, point: Vec3) -> Option<Vec3> {
        self.master.force_y_to_path(point)
    }

    /// See [`MasterPath::is_in_path_column`].
    pub fn is_in_path_column(&self, x: f32, z: f32) -> bool {
        self.master.is_in_path_column(x, z)
    }

    pub fn goal(&self) -> Vec3 {
        self.goal
    }

    pub fn master(&self) -> &Arc<MasterPath> {
        &self.master
    }

    pub fn start_cell(&self) -> CellId {
        self.master.start_cell()
    }

    pub fn goal_cell(&self) -> CellId {
        self.master.goal_cell()
    }

    pub fn cells(&self) -> &[CellId] {
        self.master.cells()
    }

    pub fn is_disposed(&self) -> bool {
        self.master.is_disposed()
    }
}
