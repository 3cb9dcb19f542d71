//! Frontier utilities.

use std::cmp::Ordering;

use crate::core::{AgentId, GridCoord};
use crate::frontier::Frontier;
use crate::grid::OccupancyGrid;
use crate::planning::{Path, PathPlanner};

/// Utility of a frontier that cannot be reached (or is already reached).
pub const UNREACHABLE: f64 = -1.0;

/// An (agent, frontier) pairing with its utility.
///
/// Ordering puts higher utility first.
#[derive(Clone, Debug)]
pub struct FrontierUtility {
    pub agent: AgentId,
    pub agent_location: GridCoord,
    pub frontier: Frontier,
    pub utility: f64,
    /// Exact path, kept once computed
    pub path: Option<Path>,
}

impl FrontierUtility {
    /// Pair with optimistic utility and no path yet.
    pub fn new(
        agent: AgentId,
        agent_location: GridCoord,
        frontier: Frontier,
        distance_exponent: f64,
    ) -> Self {
        let utility = optimistic_utility(agent_location, &frontier, distance_exponent);
        Self {
            agent,
            agent_location,
            frontier,
            utility,
            path: None,
        }
    }
}

impl PartialEq for FrontierUtility {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierUtility {}

impl Ord for FrontierUtility {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .utility
            .total_cmp(&self.utility)
            .then_with(|| self.frontier.id().cmp(&other.frontier.id()))
            .then_with(|| self.agent.cmp(&other.agent))
    }
}

impl PartialOrd for FrontierUtility {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Area over straight-line distance, an upper bound on [`exact_utility`].
pub fn optimistic_utility(from: GridCoord, frontier: &Frontier, distance_exponent: f64) -> f64 {
    let distance = from.distance(&frontier.centre()).max(1.0);
    frontier.area() / distance.powf(distance_exponent)
}

/// Area over planned path length on `grid`. [`UNREACHABLE`] if no path
/// exists or the agent already stands on the frontier centre.
pub fn exact_utility(
    grid: &OccupancyGrid,
    planner: &dyn PathPlanner,
    from: GridCoord,
    frontier: &Frontier,
    distance_exponent: f64,
) -> (f64, Path) {
    let path = planner.plan(grid, from, frontier.centre(), true);
    if !path.is_valid() || path.length() <= 0.0 {
        return (UNREACHABLE, path);
    }
    let length = path.length().max(1.0);
    (frontier.area() / length.powf(distance_exponent), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::GridPlanner;

    fn run_frontier() -> Frontier {
        Frontier::from_outline((0..5).map(|x| GridCoord::new(x, 9)).collect()).unwrap()
    }

    fn open_grid() -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(10, 10);
        for c in grid.coords().collect::<Vec<_>>() {
            grid.set_free_space_at(c);
        }
        grid
    }

    #[test]
    fn test_optimistic_decreases_with_distance() {
        let f = run_frontier();
        let near = optimistic_utility(GridCoord::new(2, 7), &f, 2.0);
        let far = optimistic_utility(GridCoord::new(2, 0), &f, 2.0);
        assert!(near > far);
        // Distance below one cell is clamped.
        let on_top = optimistic_utility(f.centre(), &f, 2.0);
        assert!((on_top - f.area()).abs() < 1e-12);
    }

    #[test]
    fn test_exact_never_exceeds_optimistic() {
        let mut grid = open_grid();
        for x in 0..8 {
            grid.set_obstacle_at(GridCoord::new(x, 5));
        }
        let f = run_frontier();
        let planner = GridPlanner::default();
        let from = GridCoord::new(2, 2);
        let (exact, path) = exact_utility(&grid, &planner, from, &f, 2.0);
        assert!(path.is_valid());
        assert!(exact > 0.0);
        assert!(exact <= optimistic_utility(from, &f, 2.0));
    }

    #[test]
    fn test_exact_unreachable() {
        let mut grid = open_grid();
        for x in 0..10 {
            grid.set_obstacle_at(GridCoord::new(x, 5));
        }
        let f = run_frontier();
        let (exact, _) = exact_utility(&grid, &GridPlanner::default(), GridCoord::new(2, 2), &f, 2.0);
        assert_eq!(exact, UNREACHABLE);

        let grid = open_grid();
        let (at_goal, _) = exact_utility(&grid, &GridPlanner::default(), f.centre(), &f, 2.0);
        assert_eq!(at_goal, UNREACHABLE);
    }

    #[test]
    fn test_ordering_higher_first() {
        let f = run_frontier();
        let near = FrontierUtility::new(AgentId(1), GridCoord::new(2, 8), f.clone(), 2.0);
        let far = FrontierUtility::new(AgentId(2), GridCoord::new(2, 0), f, 2.0);
        let mut list = vec![far.clone(), near.clone()];
        list.sort();
        assert_eq!(list[0].agent, AgentId(1));
    }
}
