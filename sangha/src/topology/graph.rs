//! Region graph built from the belief grid.

use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::debug;

use super::node::{NodeId, TopologicalNode, UNEXPLORED_NODE_ID};
use crate::core::GridCoord;
use crate::frontier::Frontier;
use crate::grid::OccupancyGrid;
use crate::planning::{Path, PathPlanner};

/// Coarse graph of free-space regions.
///
/// Node 0 is always the unexplored sentinel; real nodes start at 1.
#[derive(Clone, Debug)]
pub struct TopologicalMap {
    width: usize,
    height: usize,
    region_size: usize,
    nodes: Vec<TopologicalNode>,
    /// Node covering each cell, row-major
    area: Vec<Option<NodeId>>,
}

impl TopologicalMap {
    /// Empty map holding only the sentinel.
    pub fn new(width: usize, height: usize, region_size: usize) -> Self {
        Self {
            width,
            height,
            region_size: region_size.max(1),
            nodes: vec![TopologicalNode::unexplored()],
            area: vec![None; width * height],
        }
    }

    /// Build the graph for `grid`.
    ///
    /// Free cells are partitioned into 4-connected components inside
    /// `region_size` square blocks; each component becomes a node. Nodes are
    /// linked when two of their cells touch, and linked to the sentinel when
    /// any of their cells borders unknown space.
    pub fn build(grid: &OccupancyGrid, region_size: usize, planner: &dyn PathPlanner) -> Self {
        let mut map = Self::new(grid.width(), grid.height(), region_size);
        map.partition(grid);
        map.link(grid, planner);
        debug!(
            "Built topological map: {} nodes, {} cells per region side",
            map.nodes.len() - 1,
            map.region_size
        );
        map
    }

    fn block_of(&self, c: GridCoord) -> (usize, usize) {
        (c.x as usize / self.region_size, c.y as usize / self.region_size)
    }

    fn partition(&mut self, grid: &OccupancyGrid) {
        for c in grid.coords() {
            let Some(start) = grid.index(c) else { continue };
            if !grid.free_space_at(c) || self.area[start].is_some() {
                continue;
            }
            let id = self.nodes.len();
            let block = self.block_of(c);
            let mut cells = Vec::new();
            let mut queue = VecDeque::from([c]);
            self.area[start] = Some(id);
            while let Some(current) = queue.pop_front() {
                cells.push(current);
                for n in current.neighbors_4() {
                    let Some(index) = grid.index(n) else { continue };
                    if self.area[index].is_none() && grid.free_space_at(n) && self.block_of(n) == block {
                        self.area[index] = Some(id);
                        queue.push_back(n);
                    }
                }
            }

            let count = cells.len() as f64;
            let mx = cells.iter().map(|p| p.x as f64).sum::<f64>() / count;
            let my = cells.iter().map(|p| p.y as f64).sum::<f64>() / count;
            let position = cells
                .iter()
                .copied()
                .min_by(|a, b| {
                    let da = (a.x as f64 - mx).powi(2) + (a.y as f64 - my).powi(2);
                    let db = (b.x as f64 - mx).powi(2) + (b.y as f64 - my).powi(2);
                    da.total_cmp(&db).then_with(|| a.cmp(b))
                })
                .unwrap_or(c);

            let mut node = TopologicalNode::new(id, position);
            node.set_cells(cells);
            self.nodes.push(node);
        }
    }

    fn link(&mut self, grid: &OccupancyGrid, planner: &dyn PathPlanner) {
        let mut pairs: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();
        let mut borders_unknown: BTreeSet<NodeId> = BTreeSet::new();
        for c in grid.coords() {
            let Some(a) = self.node_at(c) else { continue };
            for n in c.neighbors_4() {
                if let Some(b) = self.node_at(n)
                    && a != b
                {
                    pairs.insert((a.min(b), a.max(b)));
                }
            }
            if c.neighbors_8().iter().any(|&n| grid.empty_at(n)) {
                borders_unknown.insert(a);
            }
        }

        for (a, b) in pairs {
            let (pa, pb) = (self.nodes[a].position(), self.nodes[b].position());
            let path = planner.plan(grid, pa, pb, true);
            let (path, length) = if path.is_valid() {
                let length = path.length();
                (Some(path), length)
            } else {
                (None, pa.distance(&pb))
            };
            let reverse = path.as_ref().map(|p| {
                let mut points = p.points().to_vec();
                points.reverse();
                Path::from_points(points, true)
            });
            self.nodes[a].add_neighbour(b, path, length);
            self.nodes[b].add_neighbour(a, reverse, length);
        }
        for a in borders_unknown {
            self.nodes[a].add_neighbour(UNEXPLORED_NODE_ID, None, f64::INFINITY);
            self.nodes[UNEXPLORED_NODE_ID].add_neighbour(a, None, f64::INFINITY);
        }

        for id in 1..self.nodes.len() {
            for gone in self.nodes[id].remove_impossible_neighbours() {
                let back = &mut self.nodes[gone];
                let keep: Vec<_> = back.edges().iter().filter(|e| e.to != id).cloned().collect();
                back.clear_edges();
                for e in keep {
                    back.add_neighbour(e.to, e.path, e.length);
                }
            }
        }
    }

    /// Rebuild in place, but only if the grid changed enough since the last
    /// rebuild. Returns whether a rebuild happened.
    pub fn update(&mut self, grid: &mut OccupancyGrid, planner: &dyn PathPlanner) -> bool {
        if !grid.has_map_changed() {
            return false;
        }
        *self = Self::build(grid, self.region_size, planner);
        grid.reset_map_changed();
        true
    }

    #[inline]
    pub fn region_size(&self) -> usize {
        self.region_size
    }

    /// All nodes, sentinel first.
    pub fn nodes(&self) -> &[TopologicalNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&TopologicalNode> {
        self.nodes.get(id)
    }

    fn node_at(&self, c: GridCoord) -> Option<NodeId> {
        if c.x < 0 || c.y < 0 || c.x as usize >= self.width || c.y as usize >= self.height {
            return None;
        }
        self.area[c.y as usize * self.width + c.x as usize]
    }

    /// Node whose region contains `c`. Falls back to an 8-neighbour's region
    /// so that agents standing on a freshly cleared cell still resolve.
    pub fn topological_area(&self, c: GridCoord) -> Option<NodeId> {
        self.node_at(c)
            .or_else(|| c.neighbors_8().iter().find_map(|&n| self.node_at(n)))
    }

    /// Positions of nodes with at least three real neighbours.
    pub fn junction_points(&self) -> Vec<GridCoord> {
        self.real_nodes()
            .filter(|n| n.neighbours().filter(|&to| to != UNEXPLORED_NODE_ID).count() >= 3)
            .map(TopologicalNode::position)
            .collect()
    }

    /// Positions of every real node.
    pub fn key_points(&self) -> Vec<GridCoord> {
        self.real_nodes().map(TopologicalNode::position).collect()
    }

    fn real_nodes(&self) -> impl Iterator<Item = &TopologicalNode> {
        self.nodes.iter().skip(1)
    }

    /// Attach each frontier to the node under its centre.
    pub fn assign_frontiers(&mut self, frontiers: &[Frontier]) {
        for frontier in frontiers {
            if let Some(id) = self.topological_area(frontier.centre()) {
                self.nodes[id].add_frontier(frontier.id());
            }
        }
    }

    /// Whether `id` is a dead end when searching away from `border`.
    ///
    /// A node is a dead end when no node reachable from it without crossing
    /// `border` is the sentinel or carries a frontier. A positive answer is
    /// cached on the node and never revoked until its edges are rebuilt.
    /// Parent pointers of newly visited nodes are set along the search tree.
    pub fn calculate_dead_end(&mut self, id: NodeId, border: &HashSet<NodeId>) -> bool {
        if id == UNEXPLORED_NODE_ID || id >= self.nodes.len() {
            return false;
        }
        if self.nodes[id].is_dead_end() {
            return true;
        }

        let mut visited: HashSet<NodeId> = border.clone();
        visited.insert(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.nodes[current].frontiers().is_empty() {
                return false;
            }
            let neighbours: Vec<NodeId> = self.nodes[current].neighbours().collect();
            for n in neighbours {
                if n == UNEXPLORED_NODE_ID {
                    return false;
                }
                if visited.insert(n) {
                    self.nodes[n].set_parent(Some(current));
                    stack.push(n);
                }
            }
        }

        self.nodes[id].mark_dead_end();
        true
    }

    /// Classify every node reachable from `root` over a single search tree.
    ///
    /// Afterwards a node is flagged dead end when its subtree holds neither
    /// the sentinel nor a frontier. Returns the number of dead-end nodes.
    pub fn calculate_dead_ends(&mut self, root: NodeId) -> usize {
        if root == UNEXPLORED_NODE_ID || root >= self.nodes.len() {
            return 0;
        }

        let mut open = vec![false; self.nodes.len()];
        let mut visited = vec![false; self.nodes.len()];
        visited[UNEXPLORED_NODE_ID] = true;
        visited[root] = true;
        self.nodes[root].set_parent(None);

        // Iterative post-order: (node, next edge index)
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        while let Some(&(current, edge)) = stack.last() {
            if let Some(next) = self.nodes[current].edges().get(edge).map(|e| e.to) {
                let top = stack.len() - 1;
                stack[top].1 += 1;
                if next == UNEXPLORED_NODE_ID {
                    open[current] = true;
                } else if !visited[next] {
                    visited[next] = true;
                    self.nodes[next].set_parent(Some(current));
                    stack.push((next, 0));
                }
                continue;
            }

            stack.pop();
            if !self.nodes[current].frontiers().is_empty() {
                open[current] = true;
            }
            if !open[current] {
                self.nodes[current].mark_dead_end();
            }
            if let Some(&(parent, _)) = stack.last()
                && open[current]
            {
                open[parent] = true;
            }
        }

        self.nodes.iter().filter(|n| n.is_dead_end()).count()
    }

    /// Whether `c` lies in a region flagged dead end.
    pub fn is_dead_end_at(&self, c: GridCoord) -> bool {
        self.topological_area(c)
            .is_some_and(|id| self.nodes[id].is_dead_end())
    }
}
