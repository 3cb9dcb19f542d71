//! Topological relay graph.
//!
//! The belief grid is cut into square blocks; every 4-connected patch of free
//! cells inside a block becomes a node. Node 0 stands for all unexplored
//! space, so a region that can still lead somewhere new is one that can reach
//! node 0. Regions that cannot are dead ends, and relays standing in them are
//! wasted.

mod graph;
mod node;
mod relay;

pub use graph::TopologicalMap;
pub use node::{Edge, NodeId, TopologicalNode, UNEXPLORED_NODE_ID};
pub use relay::{
    RelayConfig, RelayDecision, RelayPlanner, RelayPolicy, RelayRequest, RelaySite, needless_relays,
};
