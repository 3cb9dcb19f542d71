//! Topological graph node.

use crate::core::GridCoord;
use crate::frontier::FrontierId;
use crate::planning::Path;

/// Index of a node within its [`super::TopologicalMap`].
pub type NodeId = usize;

/// Sentinel node standing for all unexplored space.
pub const UNEXPLORED_NODE_ID: NodeId = 0;

/// Edge to a neighbouring node.
#[derive(Clone, Debug)]
pub struct Edge {
    pub to: NodeId,
    /// Cached path between the two node positions
    pub path: Option<Path>,
    pub length: f64,
}

/// A coarse connected region of free cells.
#[derive(Clone, Debug)]
pub struct TopologicalNode {
    id: NodeId,
    position: GridCoord,
    cells: Vec<GridCoord>,
    edges: Vec<Edge>,
    /// Sticky: once set, only cleared by [`Self::clear_edges`]
    dead_end: bool,
    parent: Option<NodeId>,
    frontiers: Vec<FrontierId>,
}

impl TopologicalNode {
    pub fn new(id: NodeId, position: GridCoord) -> Self {
        Self {
            id,
            position,
            cells: Vec::new(),
            edges: Vec::new(),
            dead_end: false,
            parent: None,
            frontiers: Vec::new(),
        }
    }

    /// The unexplored-space sentinel.
    pub fn unexplored() -> Self {
        Self::new(UNEXPLORED_NODE_ID, GridCoord::new(-1, -1))
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn is_unexplored(&self) -> bool {
        self.id == UNEXPLORED_NODE_ID
    }

    #[inline]
    pub fn position(&self) -> GridCoord {
        self.position
    }

    #[inline]
    pub fn cells(&self) -> &[GridCoord] {
        &self.cells
    }

    pub(super) fn set_cells(&mut self, cells: Vec<GridCoord>) {
        self.cells = cells;
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn neighbours(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.edges.iter().map(|e| e.to)
    }

    pub fn has_neighbour(&self, id: NodeId) -> bool {
        self.edges.iter().any(|e| e.to == id)
    }

    /// Add an edge. Rejects self loops and duplicates.
    pub fn add_neighbour(&mut self, to: NodeId, path: Option<Path>, length: f64) -> bool {
        if to == self.id || self.has_neighbour(to) {
            return false;
        }
        self.edges.push(Edge { to, path, length });
        true
    }

    pub fn path_to_neighbour(&self, id: NodeId) -> Option<&Path> {
        self.edges.iter().find(|e| e.to == id)?.path.as_ref()
    }

    /// Cached edge length; infinite if `id` is not a neighbour.
    pub fn length_to_neighbour(&self, id: NodeId) -> f64 {
        self.edges
            .iter()
            .find(|e| e.to == id)
            .map_or(f64::INFINITY, |e| e.length)
    }

    /// Drop edges to real nodes that have no valid cached path. Returns the
    /// removed neighbour ids.
    pub fn remove_impossible_neighbours(&mut self) -> Vec<NodeId> {
        let mut removed = Vec::new();
        self.edges.retain(|e| {
            let keep = e.to == UNEXPLORED_NODE_ID || e.path.as_ref().is_some_and(Path::is_valid);
            if !keep {
                removed.push(e.to);
            }
            keep
        });
        removed
    }

    /// Remove all edges. This is the only way the dead-end flag is reset.
    pub fn clear_edges(&mut self) {
        self.edges.clear();
        self.dead_end = false;
    }

    #[inline]
    pub fn is_dead_end(&self) -> bool {
        self.dead_end
    }

    pub(super) fn mark_dead_end(&mut self) {
        self.dead_end = true;
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(super) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub fn frontiers(&self) -> &[FrontierId] {
        &self.frontiers
    }

    pub fn add_frontier(&mut self, id: FrontierId) {
        if !self.frontiers.contains(&id) {
            self.frontiers.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_neighbour_rejects_self_and_duplicates() {
        let mut node = TopologicalNode::new(3, GridCoord::new(5, 5));
        assert!(!node.add_neighbour(3, None, 1.0));
        assert!(node.add_neighbour(4, None, 2.0));
        assert!(!node.add_neighbour(4, None, 7.0));
        assert_eq!(node.neighbours().collect::<Vec<_>>(), vec![4]);
        assert_eq!(node.length_to_neighbour(4), 2.0);
        assert_eq!(node.length_to_neighbour(9), f64::INFINITY);
    }

    #[test]
    fn test_remove_impossible_neighbours() {
        let mut node = TopologicalNode::new(1, GridCoord::new(0, 0));
        let path = Path::straight(GridCoord::new(0, 0), GridCoord::new(3, 0), true);
        node.add_neighbour(2, Some(path), 3.0);
        node.add_neighbour(3, None, 4.0);
        node.add_neighbour(UNEXPLORED_NODE_ID, None, f64::INFINITY);
        assert_eq!(node.remove_impossible_neighbours(), vec![3]);
        assert!(node.path_to_neighbour(2).is_some());
        assert!(node.has_neighbour(UNEXPLORED_NODE_ID));
    }

    #[test]
    fn test_dead_end_cleared_only_with_edges() {
        let mut node = TopologicalNode::new(1, GridCoord::new(0, 0));
        node.mark_dead_end();
        node.add_neighbour(UNEXPLORED_NODE_ID, None, f64::INFINITY);
        assert!(node.is_dead_end());
        node.clear_edges();
        assert!(!node.is_dead_end());
    }
}
