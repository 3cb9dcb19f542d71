//! Narrowing the extracted frontiers to the ones worth allocating.

use tracing::debug;

use crate::core::GridCoord;
use crate::frontier::{Frontier, FrontierBlacklist};
use crate::grid::OccupancyGrid;
use crate::planning::PathPlanner;

/// Select up to `max_frontiers` frontiers (input sorted largest first).
///
/// The previous round's frontier is kept at the front while it still borders
/// unknown space. Frontiers without even an optimistic path from `location`
/// are blacklisted; already blacklisted ones are skipped.
pub fn frontiers_of_interest(
    frontiers: &[Frontier],
    last: Option<&Frontier>,
    grid: &OccupancyGrid,
    planner: &dyn PathPlanner,
    location: GridCoord,
    max_frontiers: usize,
    blacklist: &mut FrontierBlacklist,
) -> Vec<Frontier> {
    let mut selected: Vec<Frontier> = Vec::new();
    if let Some(last) = last
        && last.has_unknown_boundary(grid)
        && !blacklist.rejects(last)
    {
        selected.push(last.clone());
    }

    for frontier in frontiers {
        if selected.len() >= max_frontiers {
            break;
        }
        if selected.iter().any(|s| s.id() == frontier.id())
            || blacklist.rejects(frontier)
            || !frontier.has_unknown_boundary(grid)
        {
            continue;
        }
        if !planner.plan(grid, location, frontier.centre(), false).found() {
            debug!("Blacklisting frontier at {}: no path", frontier.centre());
            blacklist.insert(frontier.id());
            continue;
        }
        selected.push(frontier.clone());
    }
    selected
}
