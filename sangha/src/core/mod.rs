//! Core types shared by every layer: cell coordinates, agent identities and
//! line rasterization.

mod line;
mod point;

pub use line::BresenhamLine;
pub use point::{AgentId, GridCoord};
