//! Radio connectivity between agents.
//!
//! The coordination layer asks a [`ConnectivityOracle`] whether two cells can
//! talk; [`CommTable`] turns pairwise answers into direct and multi-hop link
//! tables once per tick.

mod oracle;
mod table;

pub use oracle::{CommModel, ConnectivityOracle, LineOfSightOracle, PathLossOracle, RangeOracle};
pub use table::{CommNode, CommTable};
