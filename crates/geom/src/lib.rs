//! This crate implements the navigation surface primitive: triangle cells
//! linked to their neighbours across shared edges.
//!
//! * [`TriCell`] - a single triangle with up to three links, column
//!   containment and plane height queries.
//!
//! * [`TriCellMesh`] - an immutable collection of linked cells built from an
//!   indexed triangle soup.
//!
//! * [`geometry`] - signed area based half-plane tests on the xz plane.

mod cell;
pub mod geometry;
mod mesh;

pub use cell::{CellId, TriCell};
pub use mesh::{MeshError, TriCellMesh};
