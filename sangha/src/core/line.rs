//! Integer line rasterization.
//!
//! Used for line-of-sight checks, sensor rays and straight path segments:
//!
//! ```text
//! From (0,0) to (6,2):
//!
//!     2 │          ● ●
//!     1 │    ● ● ●
//!     0 ● ●
//!       └──────────────
//!        0 1 2 3 4 5 6
//! ```

use super::GridCoord;

/// Bresenham line iterator, yields every cell from `start` to `end` inclusive.
///
/// Works in all octants. Consecutive cells are always 8-adjacent.
#[derive(Clone, Debug)]
pub struct BresenhamLine {
    current: GridCoord,
    end: GridCoord,
    dx: i32,
    dy: i32,
    step_x: i32,
    step_y: i32,
    error: i32,
    done: bool,
}

impl BresenhamLine {
    pub fn new(start: GridCoord, end: GridCoord) -> Self {
        let dx = (end.x - start.x).abs();
        let dy = -(end.y - start.y).abs();
        Self {
            current: start,
            end,
            dx,
            dy,
            step_x: if start.x < end.x { 1 } else { -1 },
            step_y: if start.y < end.y { 1 } else { -1 },
            error: dx + dy,
            done: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = GridCoord;

    fn next(&mut self) -> Option<GridCoord> {
        if self.done {
            return None;
        }

        let cell = self.current;
        if cell == self.end {
            self.done = true;
            return Some(cell);
        }

        let e2 = 2 * self.error;
        if e2 >= self.dy {
            self.error += self.dy;
            self.current.x += self.step_x;
        }
        if e2 <= self.dx {
            self.error += self.dx;
            self.current.y += self.step_y;
        }

        Some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_cell() {
        let p = GridCoord::new(4, 4);
        let cells: Vec<_> = BresenhamLine::new(p, p).collect();
        assert_eq!(cells, vec![p]);
    }

    #[test]
    fn test_horizontal_and_vertical() {
        let cells: Vec<_> =
            BresenhamLine::new(GridCoord::new(0, 0), GridCoord::new(3, 0)).collect();
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[3], GridCoord::new(3, 0));

        let cells: Vec<_> =
            BresenhamLine::new(GridCoord::new(2, 5), GridCoord::new(2, 1)).collect();
        assert_eq!(cells.len(), 5);
        assert!(cells.iter().all(|c| c.x == 2));
    }

    #[test]
    fn test_endpoints_and_adjacency_all_octants() {
        let origin = GridCoord::new(0, 0);
        for end in [
            GridCoord::new(7, 3),
            GridCoord::new(3, 7),
            GridCoord::new(-3, 7),
            GridCoord::new(-7, 3),
            GridCoord::new(-7, -3),
            GridCoord::new(-3, -7),
            GridCoord::new(3, -7),
            GridCoord::new(7, -3),
        ] {
            let cells: Vec<_> = BresenhamLine::new(origin, end).collect();
            assert_eq!(cells.first(), Some(&origin));
            assert_eq!(cells.last(), Some(&end));
            assert_eq!(cells.len() as i32, origin.chebyshev_distance(&end) + 1);
            for pair in cells.windows(2) {
                assert_eq!(pair[0].chebyshev_distance(&pair[1]), 1);
            }
        }
    }
}
