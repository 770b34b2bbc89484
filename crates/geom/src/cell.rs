use glam::{Vec2, Vec3};
use parry3d::{math::Point, query::PointQuery, shape::Triangle};
use tinyvec::ArrayVec;

use crate::geometry::{signed_area_x2, TOLERANCE_STD};

/// Maximum number of links of a single cell.
pub const MAX_LINKS: usize = 3;

/// Index of a cell inside of a [`crate::TriCellMesh`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);

impl CellId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A triangular navigable surface patch.
///
/// Wall (edge) `i` of the cell goes from vertex `i` to vertex `(i + 1) % 3`
/// and link `i` is the neighbouring cell sharing wall `i` (if any).
#[derive(Clone, Debug)]
pub struct TriCell {
    vertices: [Vec3; 3],
    links: [Option<CellId>; MAX_LINKS],
    /// xz bounds of the cell.
    bounds_min: Vec2,
    bounds_max: Vec2,
    centroid: Vec3,
    normal: Vec3,
    /// Plane offset, i.e. `normal.dot(p) + d == 0` for all points of the
    /// plane.
    d: f32,
}

impl TriCell {
    /// Creates a new cell without any links.
    ///
    /// # Panics
    ///
    /// May panic if the triangle is degenerate on the xz plane (its column is
    /// empty).
    pub(crate) fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        debug_assert!(signed_area_x2(a, b, c).abs() > 0.);

        let normal = (b - a).cross(c - a).normalize();
        Self {
            vertices: [a, b, c],
            links: [None; MAX_LINKS],
            bounds_min: Vec2::new(a.x.min(b.x).min(c.x), a.z.min(b.z).min(c.z)),
            bounds_max: Vec2::new(a.x.max(b.x).max(c.x), a.z.max(b.z).max(c.z)),
            centroid: (a + b + c) / 3.,
            normal,
            d: -normal.dot(a),
        }
    }

    pub(crate) fn set_link(&mut self, wall: usize, neighbour: CellId) {
        self.links[wall] = Some(neighbour);
    }

    pub fn max_links(&self) -> usize {
        MAX_LINKS
    }

    pub fn vertex(&self, index: usize) -> Vec3 {
        self.vertices[index]
    }

    /// Returns a single coordinate of a vertex.
    ///
    /// # Arguments
    ///
    /// * `vertex` - index of the vertex (0 to 2).
    ///
    /// * `component` - 0 for x, 1 for y and 2 for z.
    pub fn vertex_value(&self, vertex: usize, component: usize) -> f32 {
        self.vertices[vertex][component]
    }

    pub fn vertices(&self) -> &[Vec3; 3] {
        &self.vertices
    }

    /// Returns the end points of wall `index`.
    pub fn wall(&self, index: usize) -> (Vec3, Vec3) {
        (
            self.vertices[index],
            self.vertices[(index + 1) % MAX_LINKS],
        )
    }

    /// Returns the cell linked across wall `index`.
    pub fn link(&self, index: usize) -> Option<CellId> {
        self.links[index]
    }

    /// Returns the index of the wall shared with `neighbour` or None if the
    /// cells are not linked.
    pub fn link_index(&self, neighbour: CellId) -> Option<usize> {
        self.links.iter().position(|&l| l == Some(neighbour))
    }

    /// Returns (up to 3) linked neighbours of the cell.
    pub fn neighbours(&self) -> ArrayVec<[CellId; MAX_LINKS]> {
        self.links.iter().flatten().copied().collect()
    }

    pub fn bounds_min_x(&self) -> f32 {
        self.bounds_min.x
    }

    pub fn bounds_min_z(&self) -> f32 {
        self.bounds_min.y
    }

    pub fn bounds_max_x(&self) -> f32 {
        self.bounds_max.x
    }

    pub fn bounds_max_z(&self) -> f32 {
        self.bounds_max.y
    }

    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    /// Returns true if point (x, z) lies inside or on the boundary of the
    /// infinite vertical extrusion of the cell.
    pub fn is_in_column(&self, x: f32, z: f32) -> bool {
        if x < self.bounds_min.x - TOLERANCE_STD
            || x > self.bounds_max.x + TOLERANCE_STD
            || z < self.bounds_min.y - TOLERANCE_STD
            || z > self.bounds_max.y + TOLERANCE_STD
        {
            return false;
        }

        let point = Vec3::new(x, 0., z);
        let [a, b, c] = self.vertices;
        let areas = [
            signed_area_x2(a, b, point),
            signed_area_x2(b, c, point),
            signed_area_x2(c, a, point),
        ];
        areas.iter().all(|&area| area > -TOLERANCE_STD)
            || areas.iter().all(|&area| area < TOLERANCE_STD)
    }

    /// Returns the height of the cell plane at point (x, z). The point does
    /// not need to be in the column of the cell.
    pub fn plane_y(&self, x: f32, z: f32) -> f32 {
        -(self.normal.x * x + self.normal.z * z + self.d) / self.normal.y
    }

    /// Returns the point of the cell closest to `point`.
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let [a, b, c] = self.vertices;
        let triangle = Triangle::new(to_point(a), to_point(b), to_point(c));
        let projection = triangle.project_local_point(&to_point(point), true);
        Vec3::new(
            projection.point.x,
            projection.point.y,
            projection.point.z,
        )
    }
}

fn to_point(vec: Vec3) -> Point<f32> {
    Point::new(vec.x, vec.y, vec.z)
}
