//! Per-tick link tables.

use std::collections::VecDeque;

use super::ConnectivityOracle;
use crate::core::{AgentId, GridCoord};
use crate::grid::OccupancyGrid;

/// A radio endpoint for link detection.
#[derive(Clone, Copy, Debug)]
pub struct CommNode {
    pub id: AgentId,
    pub location: GridCoord,
    pub range: f64,
}

/// Direct links plus their transitive closure.
///
/// A pair's usable range is the smaller of the two radios.
#[derive(Clone, Debug, Default)]
pub struct CommTable {
    ids: Vec<AgentId>,
    direct: Vec<Vec<bool>>,
    /// Connected component of every node
    component: Vec<usize>,
}

impl CommTable {
    pub fn detect(nodes: &[CommNode], grid: &OccupancyGrid, oracle: &dyn ConnectivityOracle) -> Self {
        let n = nodes.len();
        let mut direct = vec![vec![false; n]; n];
        for i in 0..n {
            direct[i][i] = true;
            for j in (i + 1)..n {
                let range = nodes[i].range.min(nodes[j].range);
                let linked = oracle.is_connected(grid, range, nodes[i].location, nodes[j].location);
                direct[i][j] = linked;
                direct[j][i] = linked;
            }
        }

        let mut component = vec![usize::MAX; n];
        let mut next_component = 0;
        for root in 0..n {
            if component[root] != usize::MAX {
                continue;
            }
            let mut queue = VecDeque::from([root]);
            component[root] = next_component;
            while let Some(i) = queue.pop_front() {
                for j in 0..n {
                    if direct[i][j] && component[j] == usize::MAX {
                        component[j] = next_component;
                        queue.push_back(j);
                    }
                }
            }
            next_component += 1;
        }

        Self {
            ids: nodes.iter().map(|node| node.id).collect(),
            direct,
            component,
        }
    }

    fn slot(&self, id: AgentId) -> Option<usize> {
        self.ids.iter().position(|&other| other == id)
    }

    /// Single-hop link.
    pub fn direct(&self, a: AgentId, b: AgentId) -> bool {
        match (self.slot(a), self.slot(b)) {
            (Some(i), Some(j)) => self.direct[i][j],
            _ => false,
        }
    }

    /// Linked through any chain of direct links.
    pub fn connected(&self, a: AgentId, b: AgentId) -> bool {
        match (self.slot(a), self.slot(b)) {
            (Some(i), Some(j)) => self.component[i] == self.component[j],
            _ => false,
        }
    }

    /// Agents directly linked to `a`, excluding `a`.
    pub fn direct_partners(&self, a: AgentId) -> Vec<AgentId> {
        let Some(i) = self.slot(a) else {
            return Vec::new();
        };
        self.ids
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i && self.direct[i][j])
            .map(|(_, &id)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::RangeOracle;

    fn node(id: u32, x: i32, range: f64) -> CommNode {
        CommNode {
            id: AgentId(id),
            location: GridCoord::new(x, 0),
            range,
        }
    }

    #[test]
    fn test_multi_hop_closure() {
        let grid = OccupancyGrid::new(100, 1);
        let nodes = [node(0, 0, 10.0), node(1, 8, 10.0), node(2, 16, 10.0), node(3, 60, 10.0)];
        let table = CommTable::detect(&nodes, &grid, &RangeOracle);

        assert!(table.direct(AgentId(0), AgentId(1)));
        assert!(!table.direct(AgentId(0), AgentId(2)));
        assert!(table.connected(AgentId(0), AgentId(2)));
        assert!(!table.connected(AgentId(0), AgentId(3)));
        assert!(table.connected(AgentId(3), AgentId(3)));
        assert_eq!(table.direct_partners(AgentId(1)), vec![AgentId(0), AgentId(2)]);
    }

    #[test]
    fn test_pair_uses_smaller_range() {
        let grid = OccupancyGrid::new(100, 1);
        let nodes = [node(0, 0, 50.0), node(1, 20, 10.0)];
        let table = CommTable::detect(&nodes, &grid, &RangeOracle);
        assert!(!table.direct(AgentId(0), AgentId(1)));
    }

    #[test]
    fn test_unknown_agent() {
        let table = CommTable::default();
        assert!(!table.connected(AgentId(1), AgentId(2)));
        assert!(table.direct_partners(AgentId(1)).is_empty());
    }
}
