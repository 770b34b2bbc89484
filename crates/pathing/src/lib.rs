//! This library implements path finding over meshes of triangle cells.
//!
//! * [`MasterNavigator`] owns all search state and processes requests
//!   submitted through cloneable [`Navigator`] handles within a time budget.
//!
//! * [`MasterPath`] is a corridor of linked cells shared by any number of
//!   [`Path`]s. A path computes its next waypoint on demand by string pulling
//!   over the corridor.
//!
//! * [`AStarSearch`] and [`DijkstraSearch`] are incremental searches used to
//!   find new corridors and to reconnect agents to existing corridors.

mod astar;
mod cache;
mod dijkstra;
mod heap;
mod jobs;
mod navigator;
mod node;
mod path;
mod request;
mod settings;

pub use astar::{AStarSearch, CorridorMatch};
pub use dijkstra::{DijkstraSearch, SearchDirection};
pub use heap::{NodeId, TriCellPathNodeHeap};
pub use navigator::{MasterNavigator, Navigator};
pub use node::SearchState;
pub use path::{MasterPath, Path, PathError, MAX_OFFSET_FACTOR};
pub use request::{NavRequest, NavRequestState};
pub use settings::NavigatorSettings;
