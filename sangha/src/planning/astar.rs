//! 8-connected A* over the belief grid.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::f64::consts::SQRT_2;

use serde::Deserialize;
use tracing::trace;

use super::{Path, PathPlanner};
use crate::core::GridCoord;
use crate::grid::OccupancyGrid;

/// Configuration for the grid planner.
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    /// Node expansions before giving up
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> usize {
    200_000
}

/// Node in the search frontier.
#[derive(Clone, Copy, Debug)]
struct SearchNode {
    coord: GridCoord,
    f_score: f64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap, coordinates break ties deterministically
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* planner with unit straight and sqrt(2) diagonal costs.
#[derive(Clone, Debug, Default)]
pub struct GridPlanner {
    config: PlannerConfig,
}

impl GridPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    #[inline]
    fn passable(grid: &OccupancyGrid, c: GridCoord, exact: bool) -> bool {
        let cell = grid.cell(c);
        grid.location_exists(c) && !cell.is_obstacle() && (cell.is_free() || !exact)
    }

    /// Octile distance, admissible for 8-connected unit grids.
    #[inline]
    fn heuristic(from: GridCoord, to: GridCoord) -> f64 {
        let dx = (to.x - from.x).abs() as f64;
        let dy = (to.y - from.y).abs() as f64;
        let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
        hi + (SQRT_2 - 1.0) * lo
    }

    fn reconstruct(parent: &HashMap<GridCoord, GridCoord>, goal: GridCoord) -> Vec<GridCoord> {
        let mut points = vec![goal];
        let mut current = goal;
        while let Some(&p) = parent.get(&current) {
            points.push(p);
            current = p;
        }
        points.reverse();
        points
    }
}

impl PathPlanner for GridPlanner {
    fn plan(&self, grid: &OccupancyGrid, start: GridCoord, goal: GridCoord, exact: bool) -> Path {
        if !grid.location_exists(start) || !grid.location_exists(goal) || grid.obstacle_at(goal) {
            return Path::not_found(exact);
        }
        if start != goal && !Self::passable(grid, goal, exact) {
            return Path::not_found(exact);
        }

        let mut open_set = BinaryHeap::new();
        let mut g_score: HashMap<GridCoord, f64> = HashMap::new();
        let mut parent: HashMap<GridCoord, GridCoord> = HashMap::new();
        let mut closed: HashSet<GridCoord> = HashSet::new();

        g_score.insert(start, 0.0);
        open_set.push(SearchNode {
            coord: start,
            f_score: Self::heuristic(start, goal),
        });

        let mut iterations = 0usize;
        while let Some(node) = open_set.pop() {
            let current = node.coord;
            if current == goal {
                return Path::from_points(Self::reconstruct(&parent, goal), exact);
            }
            if !closed.insert(current) {
                continue;
            }

            iterations += 1;
            if iterations > self.config.max_iterations {
                trace!("A* from {} to {} exceeded {} expansions", start, goal, iterations - 1);
                return Path::not_found(exact);
            }

            let current_g = g_score.get(&current).copied().unwrap_or(f64::INFINITY);
            for neighbor in current.neighbors_8() {
                if closed.contains(&neighbor) || !Self::passable(grid, neighbor, exact) {
                    continue;
                }
                let diagonal = neighbor.x != current.x && neighbor.y != current.y;
                if diagonal {
                    let corner_a = GridCoord::new(neighbor.x, current.y);
                    let corner_b = GridCoord::new(current.x, neighbor.y);
                    if !Self::passable(grid, corner_a, exact) && !Self::passable(grid, corner_b, exact)
                    {
                        continue;
                    }
                }

                let step = if diagonal { SQRT_2 } else { 1.0 };
                let tentative = current_g + step;
                if tentative < g_score.get(&neighbor).copied().unwrap_or(f64::INFINITY) {
                    g_score.insert(neighbor, tentative);
                    parent.insert(neighbor, current);
                    open_set.push(SearchNode {
                        coord: neighbor,
                        f_score: tentative + Self::heuristic(neighbor, goal),
                    });
                }
            }
        }

        Path::not_found(exact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 10x10 grid, all free, with a wall at x=5 for y in 0..8.
    fn walled_grid() -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(10, 10);
        for c in grid.coords().collect::<Vec<_>>() {
            grid.set_free_space_at(c);
        }
        for y in 0..8 {
            grid.set_obstacle_at(GridCoord::new(5, y));
        }
        grid
    }

    #[test]
    fn test_straight_path() {
        let grid = walled_grid();
        let path = GridPlanner::default().plan(&grid, GridCoord::new(0, 0), GridCoord::new(4, 0), true);
        assert!(path.is_valid());
        assert_relative_eq!(path.length(), 4.0);
        assert_eq!(path.start(), Some(GridCoord::new(0, 0)));
        assert_eq!(path.goal(), Some(GridCoord::new(4, 0)));
    }

    #[test]
    fn test_path_around_wall() {
        let grid = walled_grid();
        let start = GridCoord::new(2, 2);
        let goal = GridCoord::new(8, 2);
        let path = GridPlanner::default().plan(&grid, start, goal, true);
        assert!(path.is_valid());
        assert!(path.length() > start.distance(&goal));
        assert!(path.points().iter().all(|&c| !grid.obstacle_at(c)));
        for pair in path.points().windows(2) {
            assert_eq!(pair[0].chebyshev_distance(&pair[1]), 1);
        }
    }

    #[test]
    fn test_exact_requires_known_free() {
        let mut grid = OccupancyGrid::new(8, 1);
        for x in 0..4 {
            grid.set_free_space_at(GridCoord::new(x, 0));
        }
        grid.set_free_space_at(GridCoord::new(7, 0));
        let planner = GridPlanner::default();
        let exact = planner.plan(&grid, GridCoord::new(0, 0), GridCoord::new(7, 0), true);
        assert!(!exact.found());
        let optimistic = planner.plan(&grid, GridCoord::new(0, 0), GridCoord::new(7, 0), false);
        assert!(optimistic.found());
        assert!(!optimistic.is_exact());
    }

    #[test]
    fn test_blocked_goal() {
        let grid = walled_grid();
        let path = GridPlanner::default().plan(&grid, GridCoord::new(0, 0), GridCoord::new(5, 3), false);
        assert!(!path.found());
    }

    #[test]
    fn test_start_equals_goal() {
        let grid = walled_grid();
        let path = GridPlanner::default().plan(&grid, GridCoord::new(1, 1), GridCoord::new(1, 1), true);
        assert!(path.found());
        assert_relative_eq!(path.length(), 0.0);
    }

    #[test]
    fn test_iteration_budget() {
        let grid = walled_grid();
        let planner = GridPlanner::new(PlannerConfig { max_iterations: 3 });
        let path = planner.plan(&grid, GridCoord::new(0, 0), GridCoord::new(9, 9), true);
        assert!(!path.found());
    }
}
