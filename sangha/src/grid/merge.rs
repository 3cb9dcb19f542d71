//! Belief merge between two agents' grids.
//!
//! Contested cells are resolved by confidence rather than by recency: safe
//! readings win over ordinary ones, a safe free reading beats a safe obstacle
//! reading on either side, and an ordinary free reading wins
//! over an ordinary obstacle reading.

use tracing::{debug, warn};

use super::{CellFlags, OccupancyGrid};
use crate::core::GridCoord;

impl OccupancyGrid {
    /// Merge `partner`'s belief into this grid. `partner` is only read.
    ///
    /// Only cells whose shared-truth bits differ are visited. With
    /// `with_base_station` every visited cell is also marked known at base.
    /// Returns the visited cells, for incremental redraw.
    pub fn merge(&mut self, partner: &OccupancyGrid, with_base_station: bool) -> Vec<GridCoord> {
        if self.content_hash() == partner.content_hash() {
            return Vec::new();
        }
        if self.width() != partner.width() || self.height() != partner.height() {
            warn!(
                "Refusing to merge {}x{} grid into {}x{} grid",
                partner.width(),
                partner.height(),
                self.width(),
                self.height()
            );
            return Vec::new();
        }

        let mut changed = Vec::new();
        let mut known_at_base = 0usize;
        for index in 0..self.width() * self.height() {
            let mine = self.cell_at_index(index);
            let theirs = partner.cell_at_index(index);
            if mine.shared() == theirs.shared() {
                continue;
            }
            let c = self.coord_of(index);

            // Delivery was already delegated upstream by the partner.
            if mine.0 == 0 && theirs.is_relayed() {
                self.set_got_relayed(c, true);
            }

            self.resolve_occupancy(c, theirs);

            if (theirs.is_known_at_base() || with_base_station) && !self.known_at_base(c) {
                self.set_known_at_base(c);
                known_at_base += 1;
            }

            changed.push(c);
        }

        debug!(
            "Merged {} cells ({} newly known at base, with_base={})",
            changed.len(),
            known_at_base,
            with_base_station
        );
        changed
    }

    fn resolve_occupancy(&mut self, c: GridCoord, theirs: CellFlags) {
        let mine = self.cell(c);

        if theirs.is_safe() {
            if theirs.is_free() {
                // Safe free beats everything, including our own safe obstacle.
                self.set_no_obstacle_at(c);
                self.set_safe_space_at(c);
            } else if theirs.is_obstacle() && !(mine.is_safe() && mine.is_free()) {
                self.set_obstacle_at(c);
                self.set_safe_space_at(c);
            }
        } else if mine.is_safe() {
            // Our confident reading stands against an ordinary claim.
        } else if theirs.is_free() {
            self.set_no_obstacle_at(c);
        } else if theirs.is_obstacle() && mine.is_unknown() {
            self.set_obstacle_at(c);
        }
    }
}
