//! Path planning on an agent's belief grid.
//!
//! The coordination layer only sees [`Path`] and the [`PathPlanner`] trait;
//! [`GridPlanner`] is the default 8-connected A* implementation.

mod astar;
mod path;

pub use astar::{GridPlanner, PlannerConfig};
pub use path::Path;

use crate::core::GridCoord;
use crate::grid::OccupancyGrid;

/// Plans a path over a belief grid.
///
/// `exact` restricts the search to cells known to be free. A non-exact plan
/// may also cross unknown cells and is used for optimistic reachability
/// checks.
pub trait PathPlanner: Send + Sync {
    fn plan(&self, grid: &OccupancyGrid, start: GridCoord, goal: GridCoord, exact: bool) -> Path;
}
