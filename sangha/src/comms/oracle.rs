//! Connectivity oracles.

use serde::Deserialize;

use crate::core::{BresenhamLine, GridCoord};
use crate::grid::OccupancyGrid;

/// Decides whether two locations can communicate over `range` cells.
pub trait ConnectivityOracle: Send + Sync {
    fn is_connected(&self, grid: &OccupancyGrid, range: f64, a: GridCoord, b: GridCoord) -> bool;
}

/// Propagation model selected in configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommModel {
    /// Pure distance
    StaticCircle,
    /// Distance plus unobstructed line of sight
    #[default]
    DirectLine,
    /// Range shrinks with every wall between the two ends
    PathLoss,
}

impl CommModel {
    pub fn oracle(self) -> Box<dyn ConnectivityOracle> {
        match self {
            CommModel::StaticCircle => Box::new(RangeOracle),
            CommModel::DirectLine => Box::new(LineOfSightOracle),
            CommModel::PathLoss => Box::new(PathLossOracle::default()),
        }
    }
}

/// Connected within euclidean range, walls ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct RangeOracle;

impl ConnectivityOracle for RangeOracle {
    fn is_connected(&self, _grid: &OccupancyGrid, range: f64, a: GridCoord, b: GridCoord) -> bool {
        a.distance(&b) <= range
    }
}

/// Connected within range and with no obstacle on the straight line.
///
/// Unknown cells do not block, so an agent can predict links on its own
/// partial map.
#[derive(Clone, Copy, Debug, Default)]
pub struct LineOfSightOracle;

impl ConnectivityOracle for LineOfSightOracle {
    fn is_connected(&self, grid: &OccupancyGrid, range: f64, a: GridCoord, b: GridCoord) -> bool {
        a.distance(&b) <= range && grid.direct_line_possible(a, b, true)
    }
}

/// Each wall crossed costs `wall_penalty` of the range.
#[derive(Clone, Copy, Debug)]
pub struct PathLossOracle {
    /// Fraction of range lost per wall
    pub wall_penalty: f64,
}

impl Default for PathLossOracle {
    fn default() -> Self {
        Self { wall_penalty: 0.25 }
    }
}

impl PathLossOracle {
    /// Number of separate obstacle runs along the straight line.
    pub fn walls_between(grid: &OccupancyGrid, a: GridCoord, b: GridCoord) -> usize {
        let mut walls = 0;
        let mut inside = false;
        for c in BresenhamLine::new(a, b) {
            let obstacle = grid.obstacle_at(c);
            if obstacle && !inside {
                walls += 1;
            }
            inside = obstacle;
        }
        walls
    }
}

impl ConnectivityOracle for PathLossOracle {
    fn is_connected(&self, grid: &OccupancyGrid, range: f64, a: GridCoord, b: GridCoord) -> bool {
        let walls = Self::walls_between(grid, a, b) as f64;
        let effective = range * (1.0 - self.wall_penalty * walls).max(0.0);
        a.distance(&b) <= effective
    }
}
