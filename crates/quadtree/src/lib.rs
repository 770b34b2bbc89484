//! Simple bounded quad-tree of triangle cells implemented for fast column,
//! range and closest cell queries.
//!
//! Each cell is stored at the deepest node whose rectangle fully contains
//! the cell's xz bounding box, i.e. at the shallowest node none of whose
//! children could contain it. Children are created lazily, only once a cell
//! needs them.

mod quadrants;

use std::sync::Arc;

use glam::{Vec2, Vec3};
use nm_geom::{geometry::TOLERANCE_STD, CellId, TriCell, TriCellMesh};
use quadrants::{Quadrant, Quadrants, Rect};
use thiserror::Error;
use tracing::debug;

/// Default maximum height difference under which a cell is considered to be
/// exactly at the queried height.
pub const DEFAULT_PLANE_TOLERANCE: f32 = 0.5;

#[derive(Error, Debug, PartialEq)]
pub enum QuadTreeError {
    #[error("tree bounds {min:?} - {max:?} are not finite or have no area")]
    InvalidBounds { min: Vec2, max: Vec2 },
}

pub struct TriCellQuadTree {
    mesh: Arc<TriCellMesh>,
    nodes: Vec<Node>,
    max_depth: u32,
    plane_tolerance: f32,
    len: usize,
}

impl TriCellQuadTree {
    /// Creates a new empty tree.
    ///
    /// # Arguments
    ///
    /// * `mesh` - mesh owning all cells which will be added to the tree.
    ///
    /// * `min` - minimum (x, z) corner of the tree bounds.
    ///
    /// * `max` - maximum (x, z) corner of the tree bounds.
    ///
    /// * `max_depth` - maximum number of levels below the root node.
    pub fn new(
        mesh: Arc<TriCellMesh>,
        min: Vec2,
        max: Vec2,
        max_depth: u32,
    ) -> Result<Self, QuadTreeError> {
        if !min.is_finite() || !max.is_finite() || min.cmpge(max).any() {
            return Err(QuadTreeError::InvalidBounds { min, max });
        }

        Ok(Self {
            mesh,
            nodes: vec![Node::new(Rect::new(min, max), 0)],
            max_depth,
            plane_tolerance: DEFAULT_PLANE_TOLERANCE,
            len: 0,
        })
    }

    /// Creates a tree bounded by the mesh bounds containing all cells of the
    /// mesh.
    pub fn from_mesh(mesh: Arc<TriCellMesh>, max_depth: u32) -> Result<Self, QuadTreeError> {
        let (min, max) = mesh.bounds();
        let mut tree = Self::new(Arc::clone(&mesh), min, max, max_depth)?;
        for id in mesh.ids() {
            let added = tree.add(id);
            debug_assert!(added);
        }

        debug!(
            "Created quad-tree of {} nodes containing {} cells",
            tree.nodes.len(),
            tree.len()
        );
        Ok(tree)
    }

    /// Sets maximum height difference under which
    /// [`Self::get_closest_cell`] stops searching for a closer cell.
    pub fn with_plane_tolerance(mut self, plane_tolerance: f32) -> Self {
        self.plane_tolerance = plane_tolerance;
        self
    }

    pub fn plane_tolerance(&self) -> f32 {
        self.plane_tolerance
    }

    pub fn mesh(&self) -> &Arc<TriCellMesh> {
        &self.mesh
    }

    /// Number of cells stored in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds a cell to the tree.
    ///
    /// Returns false if the cell lies (partially) outside of the tree bounds
    /// or if it already is stored in the tree.
    pub fn add(&mut self, id: CellId) -> bool {
        let (min, max) = cell_bounds(self.mesh.cell(id));
        if !self.nodes[0].rect.contains(min, max) {
            return false;
        }

        let mut index = 0;
        'descend: loop {
            if self.nodes[index].depth < self.max_depth {
                for quadrant in Quadrant::ALL {
                    let rect = self.nodes[index].rect.child(quadrant);
                    if rect.contains(min, max) {
                        index = self.child_or_insert(index, quadrant, rect);
                        continue 'descend;
                    }
                }
            }
            break;
        }

        let cells = &mut self.nodes[index].cells;
        if cells.contains(&id) {
            return false;
        }
        cells.push(id);
        self.len += 1;
        true
    }

    /// Returns all cells whose column contains point (x, z).
    ///
    /// Node bounds are edge inclusive, thus a point lying exactly on a node
    /// split line is tested against cells of both neighbouring nodes. Nodes
    /// are widened by the column test tolerance so that points just outside
    /// of the mesh border still reach the border cells.
    pub fn get_cells_for_point(&self, x: f32, z: f32) -> Vec<CellId> {
        let point = Vec2::new(x, z);
        let mut result = Vec::new();
        self.visit(
            |rect| rect.contains_point(point, TOLERANCE_STD),
            |id| {
                if self.mesh.cell(id).is_in_column(x, z) {
                    result.push(id);
                }
            },
        );
        result
    }

    /// Returns all cells whose xz bounding box intersects the rectangle.
    pub fn get_cells_in_column(&self, min_x: f32, min_z: f32, max_x: f32, max_z: f32) -> Vec<CellId> {
        let min = Vec2::new(min_x, min_z);
        let max = Vec2::new(max_x, max_z);
        let mut result = Vec::new();
        self.visit(
            |rect| rect.intersects(min, max),
            |id| {
                let (cell_min, cell_max) = cell_bounds(self.mesh.cell(id));
                if cell_min.cmple(max).all() && cell_max.cmpge(min).all() {
                    result.push(id);
                }
            },
        );
        result
    }

    /// Returns the cell closest to `point` together with the closest point on
    /// the cell.
    ///
    /// # Arguments
    ///
    /// * `point` - searched point.
    ///
    /// * `must_be_in_column` - if true, only cells whose column contains the
    ///   point are considered and the one with plane height closest to the
    ///   point is returned (the search stops at the first cell within plane
    ///   tolerance). The returned point has the x and z of `point`. If false,
    ///   all cells in the tree are searched for the closest surface point.
    pub fn get_closest_cell(&self, point: Vec3, must_be_in_column: bool) -> Option<(CellId, Vec3)> {
        if !must_be_in_column {
            let mut candidates = Vec::with_capacity(self.len);
            self.visit(|_| true, |id| candidates.push(id));
            return self.mesh.closest_cell(point, candidates);
        }

        let mut closest: Option<(CellId, f32)> = None;
        let mut best_distance = f32::INFINITY;
        for id in self.get_cells_for_point(point.x, point.z) {
            let y = self.mesh.cell(id).plane_y(point.x, point.z);
            let distance = (y - point.y).abs();
            if distance < best_distance {
                best_distance = distance;
                closest = Some((id, y));
                if distance <= self.plane_tolerance {
                    break;
                }
            }
        }

        closest.map(|(id, y)| (id, Vec3::new(point.x, y, point.z)))
    }

    /// Visits (depth first) all cells stored in nodes accepted by `filter`.
    /// Children of rejected nodes are not visited.
    fn visit<F, V>(&self, filter: F, mut visitor: V)
    where
        F: Fn(&Rect) -> bool,
        V: FnMut(CellId),
    {
        let mut stack = vec![0];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !filter(&node.rect) {
                continue;
            }

            for &id in node.cells.iter() {
                visitor(id);
            }
            stack.extend(node.children.iter().copied());
        }
    }

    fn child_or_insert(&mut self, parent: usize, quadrant: Quadrant, rect: Rect) -> usize {
        if let Some(&child) = self.nodes[parent].children.get(quadrant) {
            return child;
        }

        let child = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(Node::new(rect, depth));
        self.nodes[parent].children.replace(quadrant, child);
        child
    }
}

struct Node {
    rect: Rect,
    /// Distance from the root node.
    depth: u32,
    /// Cells which fit into this node but into none of its (potential)
    /// children.
    cells: Vec<CellId>,
    children: Quadrants<usize>,
}

impl Node {
    fn new(rect: Rect, depth: u32) -> Self {
        Self {
            rect,
            depth,
            cells: Vec::new(),
            children: Quadrants::empty(),
        }
    }
}

fn cell_bounds(cell: &TriCell) -> (Vec2, Vec2) {
    (
        Vec2::new(cell.bounds_min_x(), cell.bounds_min_z()),
        Vec2::new(cell.bounds_max_x(), cell.bounds_max_z()),
    )
}
