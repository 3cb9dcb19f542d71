//! Grid storage, flag mutation and ownership bookkeeping.

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::OnceLock;

use tracing::trace;

use super::CellFlags;
use crate::core::GridCoord;

/// Number of newly learned cells that counts as "the map has changed".
pub const DEFAULT_MAP_CHANGED_THRESHOLD: usize = 50;

/// Occupancy belief of one agent.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    free_count: usize,
    free_known_at_base: usize,
    free_relayed_not_known_at_base: usize,
    owned_cells: HashSet<GridCoord>,
    map_cells_changed: usize,
    map_changed_threshold: usize,
    /// Memoized hash of the shared-truth bytes, reset by every mutation
    hash: OnceLock<u64>,
}

impl OccupancyGrid {
    /// Create an all-unknown grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width * height],
            free_count: 0,
            free_known_at_base: 0,
            free_relayed_not_known_at_base: 0,
            owned_cells: HashSet::new(),
            map_cells_changed: DEFAULT_MAP_CHANGED_THRESHOLD + 1,
            map_changed_threshold: DEFAULT_MAP_CHANGED_THRESHOLD,
            hash: OnceLock::new(),
        }
    }

    /// Override the map-changed threshold. The counter restarts above it.
    pub fn with_change_threshold(mut self, threshold: usize) -> Self {
        self.map_changed_threshold = threshold;
        self.map_cells_changed = threshold + 1;
        self
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Convert a coordinate to a storage index, `None` if out of bounds.
    #[inline]
    pub fn index(&self, c: GridCoord) -> Option<usize> {
        if c.x < 0 || c.y < 0 {
            return None;
        }
        let (x, y) = (c.x as usize, c.y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    #[inline]
    pub(super) fn coord_of(&self, index: usize) -> GridCoord {
        GridCoord::new((index % self.width) as i32, (index / self.width) as i32)
    }

    #[inline]
    pub fn location_exists(&self, c: GridCoord) -> bool {
        self.index(c).is_some()
    }

    /// Flags of a cell; out-of-bounds cells read as unknown.
    #[inline]
    pub fn cell(&self, c: GridCoord) -> CellFlags {
        self.index(c)
            .map(|i| CellFlags(self.cells[i]))
            .unwrap_or_default()
    }

    #[inline]
    pub(super) fn cell_at_index(&self, index: usize) -> CellFlags {
        CellFlags(self.cells[index])
    }

    fn checked_index(&self, c: GridCoord, op: &'static str) -> Option<usize> {
        let index = self.index(c);
        if index.is_none() {
            trace!("{} dropped: {} outside {}x{}", op, c, self.width, self.height);
        }
        index
    }

    #[inline]
    fn set_bits(&mut self, index: usize, bits: u8) {
        self.cells[index] |= bits;
        self.hash = OnceLock::new();
    }

    #[inline]
    fn clear_bits(&mut self, index: usize, bits: u8) {
        self.cells[index] &= !bits;
        self.hash = OnceLock::new();
    }

    // ------------------------------------------------------------------
    // Counters
    // ------------------------------------------------------------------

    /// Number of free cells.
    #[inline]
    pub fn num_free_cells(&self) -> usize {
        self.free_count
    }

    #[inline]
    pub fn num_free_known_at_base(&self) -> usize {
        self.free_known_at_base
    }

    #[inline]
    pub fn num_free_relayed(&self) -> usize {
        self.free_relayed_not_known_at_base
    }

    /// Free cells this agent still has to deliver.
    #[inline]
    pub fn owned_cells(&self) -> &HashSet<GridCoord> {
        &self.owned_cells
    }

    /// True when enough new cells were learned since the last reset.
    #[inline]
    pub fn has_map_changed(&self) -> bool {
        self.map_cells_changed > self.map_changed_threshold
    }

    #[inline]
    pub fn reset_map_changed(&mut self) {
        self.map_cells_changed = 0;
    }

    /// Content hash of the shared-truth bytes, computed at most once per
    /// mutation.
    pub fn content_hash(&self) -> u64 {
        *self.hash.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            self.width.hash(&mut hasher);
            self.height.hash(&mut hasher);
            for &byte in &self.cells {
                (byte & !CellFlags::LOCAL_MASK).hash(&mut hasher);
            }
            hasher.finish()
        })
    }

    // ------------------------------------------------------------------
    // Free space / obstacles
    //
    // Every mutator returns false if the coordinate is outside the grid,
    // in which case nothing was changed.
    // ------------------------------------------------------------------

    /// Mark a cell free. No-op for obstacle cells.
    ///
    /// The first time a cell becomes free it is routed into exactly one
    /// ownership bucket: known at base, relayed, or owned.
    pub fn set_free_space_at(&mut self, c: GridCoord) -> bool {
        let Some(index) = self.checked_index(c, "set_free_space_at") else {
            return false;
        };
        let cell = CellFlags(self.cells[index]);
        if cell.is_obstacle() {
            return true;
        }
        if !cell.is_free() {
            self.map_cells_changed += 1;
            self.free_count += 1;
            if cell.is_known_at_base() {
                self.free_known_at_base += 1;
            } else if cell.is_relayed() {
                self.free_relayed_not_known_at_base += 1;
            } else {
                self.owned_cells.insert(c);
            }
        }
        self.set_bits(index, CellFlags::FREE);
        true
    }

    pub fn set_no_free_space_at(&mut self, c: GridCoord) -> bool {
        let Some(index) = self.checked_index(c, "set_no_free_space_at") else {
            return false;
        };
        let cell = CellFlags(self.cells[index]);
        if cell.is_free() {
            self.free_count -= 1;
            if cell.is_known_at_base() {
                self.free_known_at_base -= 1;
            } else if cell.is_relayed() {
                self.free_relayed_not_known_at_base -= 1;
            } else {
                self.owned_cells.remove(&c);
            }
        }
        // A safe reading only outlives the free bit on an obstacle
        let mask = if cell.is_obstacle() {
            CellFlags::FREE
        } else {
            CellFlags::FREE | CellFlags::SAFE
        };
        self.clear_bits(index, mask);
        true
    }

    pub fn set_obstacle_at(&mut self, c: GridCoord) -> bool {
        if !self.set_no_free_space_at(c) {
            return false;
        }
        if let Some(index) = self.index(c) {
            self.set_bits(index, CellFlags::OBSTACLE);
        }
        true
    }

    /// Withdraw an obstacle claim; the cell becomes free.
    pub fn set_no_obstacle_at(&mut self, c: GridCoord) -> bool {
        let Some(index) = self.checked_index(c, "set_no_obstacle_at") else {
            return false;
        };
        self.clear_bits(index, CellFlags::OBSTACLE);
        self.set_free_space_at(c)
    }

    /// Mark a cell as confidently observed. Forces free unless the cell is an
    /// obstacle.
    pub fn set_safe_space_at(&mut self, c: GridCoord) -> bool {
        let Some(index) = self.checked_index(c, "set_safe_space_at") else {
            return false;
        };
        self.set_bits(index, CellFlags::SAFE);
        self.set_free_space_at(c)
    }

    pub fn set_no_safe_space_at(&mut self, c: GridCoord) -> bool {
        let Some(index) = self.checked_index(c, "set_no_safe_space_at") else {
            return false;
        };
        self.clear_bits(index, CellFlags::SAFE);
        true
    }

    // ------------------------------------------------------------------
    // Delivery bookkeeping
    // ------------------------------------------------------------------

    /// Record that the base station has this cell. Idempotent and monotonic.
    pub fn set_known_at_base(&mut self, c: GridCoord) -> bool {
        let Some(index) = self.checked_index(c, "set_known_at_base") else {
            return false;
        };
        let cell = CellFlags(self.cells[index]);
        if cell.is_known_at_base() {
            return true;
        }
        if cell.is_free() {
            self.free_known_at_base += 1;
            if cell.is_relayed() {
                self.free_relayed_not_known_at_base -= 1;
            } else {
                self.owned_cells.remove(&c);
            }
        }
        self.set_bits(index, CellFlags::KNOWN_AT_BASE);
        true
    }

    /// Hand delivery of a cell over to a relay.
    ///
    /// With `update_ownership == false` the owned set is left untouched; the
    /// caller must clear it itself (see [`Self::set_owned_cells_relayed`]).
    pub(super) fn set_got_relayed(&mut self, c: GridCoord, update_ownership: bool) -> bool {
        let Some(index) = self.checked_index(c, "set_got_relayed") else {
            return false;
        };
        let cell = CellFlags(self.cells[index]);
        if !cell.is_relayed() && cell.is_free() && !cell.is_known_at_base() {
            self.free_relayed_not_known_at_base += 1;
            if update_ownership {
                self.owned_cells.remove(&c);
            }
        }
        self.set_bits(index, CellFlags::GOT_RELAYED);
        true
    }

    /// Take delivery responsibility back from a relay.
    pub fn set_got_unrelayed(&mut self, c: GridCoord) -> bool {
        let Some(index) = self.checked_index(c, "set_got_unrelayed") else {
            return false;
        };
        let cell = CellFlags(self.cells[index]);
        if cell.is_relayed() && cell.is_free() && !cell.is_known_at_base() {
            self.free_relayed_not_known_at_base -= 1;
            self.owned_cells.insert(c);
        }
        self.clear_bits(index, CellFlags::GOT_RELAYED);
        true
    }

    /// Hand every owned cell to a relay at once. Returns how many were handed
    /// over. KnownAtBase bits are not touched.
    pub fn set_owned_cells_relayed(&mut self) -> usize {
        let owned: Vec<GridCoord> = self.owned_cells.iter().copied().collect();
        for &c in &owned {
            self.set_got_relayed(c, false);
        }
        self.owned_cells.clear();
        owned.len()
    }

    // ------------------------------------------------------------------
    // Topological bookkeeping
    // ------------------------------------------------------------------

    #[inline]
    pub fn is_final_topological_map_cell(&self, c: GridCoord) -> bool {
        self.cell(c).contains(CellFlags::FINAL_TOPOLOGICAL)
    }

    pub fn set_final_topological_map_cell(&mut self, c: GridCoord) -> bool {
        let Some(index) = self.checked_index(c, "set_final_topological_map_cell") else {
            return false;
        };
        self.set_bits(index, CellFlags::FINAL_TOPOLOGICAL);
        true
    }

    pub fn unset_final_topological_map_cell(&mut self, c: GridCoord) -> bool {
        let Some(index) = self.checked_index(c, "unset_final_topological_map_cell") else {
            return false;
        };
        self.clear_bits(index, CellFlags::FINAL_TOPOLOGICAL);
        true
    }
}
