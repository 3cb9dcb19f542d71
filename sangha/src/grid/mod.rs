//! Per-agent occupancy belief.
//!
//! Every agent owns one [`OccupancyGrid`]. Sensing writes into it, and each
//! communication round merges a partner's grid into it (read-only on the
//! partner side).
//!
//! ## Cell layout
//!
//! One byte per cell, row-major (`index = y * width + x`):
//!
//! ```text
//!  bit   7   6   5        4        3        2      1      0
//!      ┌───┬───┬────────┬────────┬────────┬──────┬──────┬──────┐
//!      │ - │ - │ FINAL  │RELAYED │ AT_BASE│ SAFE │ OBST │ FREE │
//!      └───┴───┴────────┴────────┴────────┴──────┴──────┴──────┘
//!                └── per-agent ──┘ └──────── shared truth ──────┘
//! ```
//!
//! `RELAYED` and `FINAL` are local bookkeeping and never take part in merge
//! comparisons or the content hash.
//!
//! ## Ownership counters
//!
//! Every free cell is accounted for in exactly one bucket:
//!
//! ```text
//! free_count == free_known_at_base
//!             + free_relayed_not_known_at_base
//!             + owned_cells.len()
//! ```
//!
//! Owned cells are the agent's outstanding delivery responsibility: free cells
//! that neither the base nor a relay has taken over yet.

mod cell;
mod export;
mod merge;
mod occupancy;
mod query;

pub use cell::CellFlags;
pub use occupancy::{DEFAULT_MAP_CHANGED_THRESHOLD, OccupancyGrid};
