//! This module contains an immutable mesh of linked triangle cells.

use ahash::AHashMap;
use glam::{Vec2, Vec3};
use thiserror::Error;
use tracing::debug;

use crate::{
    cell::{CellId, TriCell, MAX_LINKS},
    geometry::{signed_area_x2, TOLERANCE_STD},
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MeshError {
    #[error("the mesh contains no triangles")]
    Empty,
    #[error("triangle {triangle} references vertex {vertex} which does not exist")]
    InvalidIndex { triangle: usize, vertex: u32 },
    #[error("triangle {0} has no area on the xz plane")]
    Degenerate(usize),
    #[error("edge {0}-{1} is shared by more than two triangles")]
    NonManifoldEdge(u32, u32),
}

/// Navigation surface made of triangle cells linked across shared edges.
pub struct TriCellMesh {
    cells: Vec<TriCell>,
    /// xz bounds of all cells.
    min: Vec2,
    max: Vec2,
}

impl TriCellMesh {
    /// Creates a new mesh from an indexed triangle soup.
    ///
    /// Two triangles are linked if they share an edge, i.e. two vertex
    /// indices. Shared vertices must be referenced by the same index, equal
    /// positions under distinct indices are not linked.
    ///
    /// # Arguments
    ///
    /// * `vertices` - vertex positions, y is the up axis.
    ///
    /// * `indices` - vertex indices of each triangle.
    ///
    /// # Panics
    ///
    /// Panics if there are more than `u32::MAX` triangles.
    pub fn from_triangles(vertices: &[Vec3], indices: &[[u32; 3]]) -> Result<Self, MeshError> {
        if indices.is_empty() {
            return Err(MeshError::Empty);
        }
        assert!(
            u32::try_from(indices.len()).is_ok(),
            "Cell IDs are limited to u32."
        );

        let mut cells = Vec::with_capacity(indices.len());
        let mut walls: AHashMap<(u32, u32), (CellId, usize)> =
            AHashMap::with_capacity(indices.len() * MAX_LINKS);
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);

        for (triangle, triangle_indices) in indices.iter().enumerate() {
            let mut points = [Vec3::ZERO; 3];
            for (point, &vertex) in points.iter_mut().zip(triangle_indices) {
                *point = *vertices
                    .get(vertex as usize)
                    .ok_or(MeshError::InvalidIndex { triangle, vertex })?;
            }

            let [a, b, c] = points;
            if signed_area_x2(a, b, c).abs() < TOLERANCE_STD {
                return Err(MeshError::Degenerate(triangle));
            }

            let id = CellId::new(triangle as u32);
            let mut cell = TriCell::new(a, b, c);

            for wall in 0..MAX_LINKS {
                let start = triangle_indices[wall];
                let end = triangle_indices[(wall + 1) % MAX_LINKS];
                let key = (start.min(end), start.max(end));

                match walls.get(&key).copied() {
                    None => {
                        walls.insert(key, (id, wall));
                    }
                    Some((other, _)) if other == id => {
                        return Err(MeshError::Degenerate(triangle));
                    }
                    Some((other, other_wall)) => {
                        let other_cell: &mut TriCell = &mut cells[other.index()];
                        if other_cell.link(other_wall).is_some() {
                            return Err(MeshError::NonManifoldEdge(key.0, key.1));
                        }
                        other_cell.set_link(other_wall, id);
                        cell.set_link(wall, other);
                    }
                }
            }

            min = min.min(Vec2::new(cell.bounds_min_x(), cell.bounds_min_z()));
            max = max.max(Vec2::new(cell.bounds_max_x(), cell.bounds_max_z()));
            cells.push(cell);
        }

        debug!(
            "Created mesh of {} cells bounded by {:?} and {:?}",
            cells.len(),
            min,
            max
        );

        Ok(Self { cells, min, max })
    }

    /// Creates a flat (y = 0) rectangular grid of `cols` x `rows` squares,
    /// each split into two cells. The grid starts at the origin and extends
    /// to positive x and z.
    ///
    /// # Panics
    ///
    /// Panics if `cols` or `rows` is zero or if `size` is not positive.
    pub fn grid(cols: u32, rows: u32, size: f32) -> Self {
        assert!(cols > 0 && rows > 0);
        assert!(size > 0.);

        let mut vertices = Vec::with_capacity(((cols + 1) * (rows + 1)) as usize);
        for row in 0..=rows {
            for col in 0..=cols {
                vertices.push(Vec3::new(col as f32 * size, 0., row as f32 * size));
            }
        }

        let index = |col: u32, row: u32| row * (cols + 1) + col;
        let mut indices = Vec::with_capacity((2 * cols * rows) as usize);
        for row in 0..rows {
            for col in 0..cols {
                let a = index(col, row);
                let b = index(col + 1, row);
                let c = index(col + 1, row + 1);
                let d = index(col, row + 1);
                indices.push([a, b, c]);
                indices.push([a, c, d]);
            }
        }

        Self::from_triangles(vertices.as_slice(), indices.as_slice()).unwrap()
    }

    /// Returns the cell with a given ID.
    ///
    /// # Panics
    ///
    /// Panics if the cell does not belong to the mesh.
    pub fn cell(&self, id: CellId) -> &TriCell {
        &self.cells[id.index()]
    }

    pub fn get(&self, id: CellId) -> Option<&TriCell> {
        self.cells.get(id.index())
    }

    /// Returns an iterator over IDs of all cells.
    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        (0..self.cells.len()).map(|i| CellId::new(i as u32))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns minimum and maximum (x, z) corners of the mesh.
    pub fn bounds(&self) -> (Vec2, Vec2) {
        (self.min, self.max)
    }

    /// Returns the candidate cell closest to `point` together with the
    /// closest point on that cell. Returns None if `candidates` is empty.
    ///
    /// The search is exhaustive; ties are resolved in favour of the first
    /// candidate.
    pub fn closest_cell<I>(&self, point: Vec3, candidates: I) -> Option<(CellId, Vec3)>
    where
        I: IntoIterator<Item = CellId>,
    {
        let mut closest: Option<(CellId, Vec3, f32)> = None;
        for id in candidates {
            let on_cell = self.cell(id).closest_point(point);
            let distance = on_cell.distance_squared(point);
            if closest.map_or(true, |(_, _, best)| distance < best) {
                closest = Some((id, on_cell, distance));
            }
        }
        closest.map(|(id, on_cell, _)| (id, on_cell))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_links() {
        let vertices = [
            Vec3::new(0., 0., 0.),
            Vec3::new(1., 0., 0.),
            Vec3::new(1., 0., 1.),
            Vec3::new(0., 0., 1.),
            Vec3::new(2., 0., 0.),
        ];
        let mesh = TriCellMesh::from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3], [1, 4, 2]])
            .unwrap();

        let a = CellId::new(0);
        let b = CellId::new(1);
        let c = CellId::new(2);

        assert_eq!(mesh.len(), 3);
        assert_eq!(mesh.cell(a).link(0), None);
        assert_eq!(mesh.cell(a).link(1), Some(c));
        assert_eq!(mesh.cell(a).link(2), Some(b));
        assert_eq!(mesh.cell(b).link(0), Some(a));
        assert_eq!(mesh.cell(c).link(2), Some(a));
        assert_eq!(mesh.cell(b).link_index(c), None);

        let (min, max) = mesh.bounds();
        assert_eq!(min, Vec2::new(0., 0.));
        assert_eq!(max, Vec2::new(2., 1.));
    }

    #[test]
    fn test_invalid() {
        let vertices = [
            Vec3::new(0., 0., 0.),
            Vec3::new(1., 0., 0.),
            Vec3::new(1., 0., 1.),
            Vec3::new(2., 0., 2.),
            Vec3::new(0., 0., -1.),
            Vec3::new(5., 0., 5.),
        ];

        assert_eq!(
            TriCellMesh::from_triangles(&vertices, &[]).err(),
            Some(MeshError::Empty)
        );
        assert_eq!(
            TriCellMesh::from_triangles(&vertices, &[[0, 1, 9]]).err(),
            Some(MeshError::InvalidIndex {
                triangle: 0,
                vertex: 9
            })
        );
        assert_eq!(
            TriCellMesh::from_triangles(&vertices, &[[0, 1, 2], [0, 2, 3]]).err(),
            Some(MeshError::Degenerate(1))
        );
        assert_eq!(
            TriCellMesh::from_triangles(&vertices, &[[0, 1, 2], [1, 0, 4], [0, 1, 5]]).err(),
            Some(MeshError::NonManifoldEdge(0, 1))
        );
    }

    #[test]
    fn test_grid() {
        let mesh = TriCellMesh::grid(3, 2, 2.);
        assert_eq!(mesh.len(), 12);
        assert_eq!(mesh.bounds(), (Vec2::ZERO, Vec2::new(6., 4.)));

        // Every cell of a grid has at least one neighbour and interior cells
        // have three.
        assert!(mesh.ids().all(|id| !mesh.cell(id).neighbours().is_empty()));
        assert_eq!(mesh.cell(CellId::new(3)).neighbours().len(), 3);

        assert_eq!(
            mesh.get(CellId::new(11)).map(|cell| cell.vertices()[2]),
            Some(Vec3::new(4., 0., 4.))
        );
        assert!(mesh.get(CellId::new(12)).is_none());
    }

    #[test]
    fn test_closest_cell() {
        let mesh = TriCellMesh::grid(2, 2, 1.);
        assert!(mesh.closest_cell(Vec3::ZERO, []).is_none());

        let (id, point) = mesh
            .closest_cell(Vec3::new(3., 2., 0.25), mesh.ids())
            .unwrap();
        assert_eq!(id, CellId::new(2));
        assert_abs_diff_eq!(point.x, 2., epsilon = 0.0001);
        assert_abs_diff_eq!(point.y, 0., epsilon = 0.0001);
        assert_abs_diff_eq!(point.z, 0.25, epsilon = 0.0001);
    }
}
