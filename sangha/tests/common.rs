//! Test utilities for Sangha integration tests.
//!
//! Small worlds, sensed beliefs and scenario builders.

#![allow(dead_code)]

use sangha::config::WallConfig;
use sangha::sim::{Environment, sense};
use sangha::{GridCoord, OccupancyGrid, SanghaConfig};

/// Walled room with a vertical divider that has a doorway at `door_y`.
pub fn divided_room(width: usize, height: usize, door_y: i32) -> Environment {
    let mut env = Environment::new(width, height);
    let divider = width as i32 / 2;
    env.add_wall(&WallConfig {
        x: divider,
        y: 0,
        width: 1,
        height: door_y,
    });
    env.add_wall(&WallConfig {
        x: divider,
        y: door_y + 2,
        width: 1,
        height: height as i32,
    });
    env.add_border();
    env
}

/// Empty belief of the same size as `env`.
pub fn blank_grid(env: &Environment) -> OccupancyGrid {
    OccupancyGrid::new(env.width(), env.height())
}

/// Belief after one scan from every location in `spots`.
pub fn sensed_grid(env: &Environment, spots: &[GridCoord], range: f64) -> OccupancyGrid {
    let mut grid = blank_grid(env);
    for &spot in spots {
        sense(env, &mut grid, spot, range, range / 2.0);
    }
    grid
}

/// Free cells in `grid` that are obstacles in truth, or vice versa.
pub fn disagreements(env: &Environment, grid: &OccupancyGrid) -> usize {
    grid.coords()
        .filter(|&c| {
            (grid.free_space_at(c) && env.is_wall(c)) || (grid.obstacle_at(c) && !env.is_wall(c))
        })
        .count()
}

/// Scenario text around a `[[robots]]` block, in a 40x30 walled world.
pub fn scenario(max_ticks: u64, robots: &str) -> SanghaConfig {
    let toml = format!(
        r#"
[simulation]
max_ticks = {max_ticks}
seed = 3
coverage_goal = 99.5

[environment]
width = 40
height = 30

[[environment.walls]]
x = 20
y = 1
width = 1
height = 18

[base]
location = {{ x = 3, y = 3 }}
comm_range = 20.0

{robots}

[output]
log_interval = 0
"#
    );
    SanghaConfig::from_toml(&toml).expect("scenario parses")
}

/// Ownership accounting must hold for every belief.
pub fn assert_ownership_invariant(grid: &OccupancyGrid) {
    assert_eq!(
        grid.num_free_cells(),
        grid.num_free_known_at_base() + grid.num_free_relayed() + grid.owned_cells().len(),
        "free cells must be split exactly between base, relays and owner"
    );
}
