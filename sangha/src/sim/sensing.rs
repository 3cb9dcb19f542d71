//! Range sensor model.

use crate::core::{BresenhamLine, GridCoord};
use crate::grid::OccupancyGrid;

use super::Environment;

/// 360° scan by ray casting toward every cell on the square around
/// `location`. Rays stop at the first wall or past `sense_range`; readings
/// closer than `safe_range` are marked safe. Returns the number of cells
/// whose belief changed.
pub fn sense(
    truth: &Environment,
    grid: &mut OccupancyGrid,
    location: GridCoord,
    sense_range: f64,
    safe_range: f64,
) -> usize {
    let reach = sense_range.ceil() as i32;
    let mut changed = 0;
    for target in square_ring(location, reach) {
        for c in BresenhamLine::new(location, target) {
            let distance = location.distance(&c);
            if distance > sense_range || !grid.location_exists(c) {
                break;
            }
            let before = grid.cell(c);
            let safe = distance <= safe_range;
            let wall = truth.is_wall(c);
            if wall {
                grid.set_obstacle_at(c);
            } else if before.is_obstacle() {
                grid.set_no_obstacle_at(c);
            } else {
                grid.set_free_space_at(c);
            }
            if safe {
                grid.set_safe_space_at(c);
            }
            if grid.cell(c) != before {
                changed += 1;
            }
            if wall {
                break;
            }
        }
    }
    changed
}

/// Cells at Chebyshev distance exactly `radius` from `centre`.
fn square_ring(centre: GridCoord, radius: i32) -> impl Iterator<Item = GridCoord> {
    (-radius..=radius).flat_map(move |dy| {
        (-radius..=radius)
            .filter(move |&dx| dx.abs() == radius || dy.abs() == radius)
            .map(move |dx| GridCoord::new(centre.x + dx, centre.y + dy))
    })
}
