//! Read-only cell queries.

use super::OccupancyGrid;
use crate::core::{BresenhamLine, GridCoord};

impl OccupancyGrid {
    #[inline]
    pub fn free_space_at(&self, c: GridCoord) -> bool {
        self.cell(c).is_free()
    }

    #[inline]
    pub fn obstacle_at(&self, c: GridCoord) -> bool {
        self.cell(c).is_obstacle()
    }

    #[inline]
    pub fn safe_space_at(&self, c: GridCoord) -> bool {
        self.cell(c).is_safe()
    }

    #[inline]
    pub fn known_at_base(&self, c: GridCoord) -> bool {
        self.cell(c).is_known_at_base()
    }

    #[inline]
    pub fn got_relayed(&self, c: GridCoord) -> bool {
        self.cell(c).is_relayed()
    }

    /// Neither free nor obstacle. Cells outside the grid are not empty.
    #[inline]
    pub fn empty_at(&self, c: GridCoord) -> bool {
        self.location_exists(c) && self.cell(c).is_unknown()
    }

    /// At least one of the 8 neighbours is unknown.
    pub fn frontier_border_cell_at(&self, c: GridCoord) -> bool {
        c.neighbors_8().iter().any(|&n| self.empty_at(n))
    }

    /// Free, not an obstacle, and bordering unknown space.
    pub fn frontier_cell_at(&self, c: GridCoord) -> bool {
        let cell = self.cell(c);
        cell.is_free() && !cell.is_obstacle() && self.frontier_border_cell_at(c)
    }

    /// Whether an agent may move from `from` to `to` on this grid.
    ///
    /// Every cell along the straight line must be inside the grid and not an
    /// obstacle; a diagonal step additionally needs one of its two orthogonal
    /// corners clear.
    pub fn legal_move(&self, from: GridCoord, to: GridCoord) -> bool {
        let mut previous = from;
        for cell in BresenhamLine::new(from, to) {
            if !self.location_exists(cell) || self.obstacle_at(cell) {
                return false;
            }
            if cell.x != previous.x && cell.y != previous.y {
                let corner_a = GridCoord::new(cell.x, previous.y);
                let corner_b = GridCoord::new(previous.x, cell.y);
                if self.obstacle_at(corner_a) && self.obstacle_at(corner_b) {
                    return false;
                }
            }
            previous = cell;
        }
        true
    }

    /// Straight line of free cells (or unknown ones too, if `allow_unknown`).
    pub fn direct_line_possible(&self, a: GridCoord, b: GridCoord, allow_unknown: bool) -> bool {
        BresenhamLine::new(a, b).all(|c| {
            let cell = self.cell(c);
            self.location_exists(c)
                && !cell.is_obstacle()
                && (cell.is_free() || allow_unknown)
        })
    }

    /// Any obstacle within euclidean `distance` cells of `c`.
    pub fn obstacle_within_distance(&self, c: GridCoord, distance: i32) -> bool {
        let limit = (distance as i64) * (distance as i64);
        (-distance..=distance).any(|dy| {
            (-distance..=distance).any(|dx| {
                let n = GridCoord::new(c.x + dx, c.y + dy);
                n.distance_squared(&c) <= limit && self.obstacle_at(n)
            })
        })
    }

    /// All coordinates in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = GridCoord> + '_ {
        (0..self.width() * self.height()).map(|i| self.coord_of(i))
    }

    /// Display raster, rows indexed `[y][x]`, 1 for free and 0 otherwise.
    pub fn int_grid(&self) -> Vec<Vec<u8>> {
        (0..self.height())
            .map(|y| {
                (0..self.width())
                    .map(|x| {
                        let c = self.cell_at_index(y * self.width() + x);
                        u8::from(c.is_free())
                    })
                    .collect()
            })
            .collect()
    }

    /// Number of cells whose shared-truth bits include all of `flags`.
    pub fn count_cells_with(&self, flags: u8) -> usize {
        (0..self.width() * self.height())
            .filter(|&i| self.cell_at_index(i).shared() & flags == flags)
            .count()
    }
}
