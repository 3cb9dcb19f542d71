//! Frontier extraction.
//!
//! A frontier is a run of known-free cells bordering unknown space. Raw
//! outlines come from a [`ContourTracer`]; [`extract_frontiers`] turns them
//! into [`Frontier`]s, dropping small and blacklisted ones.

mod blacklist;
mod region;
mod tracer;

pub use blacklist::FrontierBlacklist;
pub use region::{Frontier, FrontierId};
pub use tracer::{ContourTracer, FrontierCellTracer};

use crate::core::GridCoord;

/// Build frontiers from traced outlines, largest first.
pub fn extract_frontiers(
    contours: Vec<Vec<GridCoord>>,
    min_area: f64,
    blacklist: &FrontierBlacklist,
) -> Vec<Frontier> {
    let mut frontiers: Vec<Frontier> = contours
        .into_iter()
        .filter_map(Frontier::from_outline)
        .filter(|f| f.area() >= min_area && !blacklist.rejects(f))
        .collect();
    frontiers.sort();
    frontiers
}
