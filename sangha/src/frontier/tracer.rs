//! Boundary tracing.

use std::collections::{BTreeSet, VecDeque};

use crate::core::GridCoord;
use crate::grid::OccupancyGrid;

/// Turns a grid into ordered boundary polylines.
pub trait ContourTracer: Send + Sync {
    fn find_all_contours(&self, grid: &OccupancyGrid) -> Vec<Vec<GridCoord>>;
}

/// Groups 8-connected frontier cells and orders each group into a polyline.
///
/// Each group is walked greedily from its first cell in `(x, y)` order,
/// always stepping to the nearest unvisited cell, so a straight run comes out
/// in order.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrontierCellTracer;

impl FrontierCellTracer {
    fn clusters(grid: &OccupancyGrid) -> Vec<Vec<GridCoord>> {
        let mut remaining: BTreeSet<GridCoord> =
            grid.coords().filter(|&c| grid.frontier_cell_at(c)).collect();
        let mut clusters = Vec::new();

        while let Some(seed) = remaining.pop_first() {
            let mut cluster = vec![seed];
            let mut queue = VecDeque::from([seed]);
            while let Some(c) = queue.pop_front() {
                for n in c.neighbors_8() {
                    if remaining.remove(&n) {
                        cluster.push(n);
                        queue.push_back(n);
                    }
                }
            }
            clusters.push(cluster);
        }
        clusters
    }

    fn order(cluster: Vec<GridCoord>) -> Vec<GridCoord> {
        let mut unvisited: BTreeSet<GridCoord> = cluster.into_iter().collect();
        let Some(mut current) = unvisited.pop_first() else {
            return Vec::new();
        };
        let mut polyline = vec![current];
        while let Some(&next) = unvisited
            .iter()
            .min_by_key(|c| (c.distance_squared(&current), **c))
        {
            unvisited.remove(&next);
            polyline.push(next);
            current = next;
        }
        polyline
    }
}

impl ContourTracer for FrontierCellTracer {
    fn find_all_contours(&self, grid: &OccupancyGrid) -> Vec<Vec<GridCoord>> {
        Self::clusters(grid).into_iter().map(Self::order).collect()
    }
}
