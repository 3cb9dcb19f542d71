//! Planned path with a follow cursor.

use crate::core::{BresenhamLine, GridCoord};

/// Result of a planning request.
///
/// Points start at the planning origin. [`Path::next_point`] advances a
/// cursor along them.
#[derive(Clone, Debug, Default)]
pub struct Path {
    points: Vec<GridCoord>,
    cursor: usize,
    length: f64,
    found: bool,
    valid: bool,
    exact: bool,
}

impl Path {
    /// A failed planning request.
    pub fn not_found(exact: bool) -> Self {
        Self {
            exact,
            ..Self::default()
        }
    }

    /// A path through `points`. Empty input yields a not-found path.
    pub fn from_points(points: Vec<GridCoord>, exact: bool) -> Self {
        let length = points.windows(2).map(|w| w[0].distance(&w[1])).sum();
        let found = !points.is_empty();
        Self {
            points,
            cursor: 0,
            length,
            found,
            valid: found,
            exact,
        }
    }

    /// Straight rasterized segment from `start` to `goal`.
    pub fn straight(start: GridCoord, goal: GridCoord, exact: bool) -> Self {
        Self::from_points(BresenhamLine::new(start, goal).collect(), exact)
    }

    #[inline]
    pub fn found(&self) -> bool {
        self.found
    }

    /// Found and not invalidated since.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.found && self.valid
    }

    /// Mark the path stale, e.g. after the agent was blocked.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    #[inline]
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Total length in cells.
    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn points(&self) -> &[GridCoord] {
        &self.points
    }

    pub fn start(&self) -> Option<GridCoord> {
        self.points.first().copied()
    }

    pub fn goal(&self) -> Option<GridCoord> {
        self.points.last().copied()
    }

    /// Point halfway along the point list.
    pub fn midpoint(&self) -> Option<GridCoord> {
        self.points.get(self.points.len() / 2).copied()
    }

    /// Points not yet handed out by [`Self::next_point`].
    pub fn remaining(&self) -> &[GridCoord] {
        self.points.get(self.cursor + 1..).unwrap_or(&[])
    }

    /// Advance the cursor and return the next point, `None` at the goal.
    pub fn next_point(&mut self) -> Option<GridCoord> {
        if self.cursor + 1 < self.points.len() {
            self.cursor += 1;
            Some(self.points[self.cursor])
        } else {
            None
        }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.remaining().is_empty()
    }
}
