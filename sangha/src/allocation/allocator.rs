//! Decentralized frontier assignment.
//!
//! Every agent runs the same allocation over its own view of the team, so no
//! negotiation messages are needed: with consistent inputs all agents arrive
//! at the same matching.
//!
//! ## Algorithm
//!
//! ```text
//! queue = all (agent, frontier) pairs, keyed by optimistic utility
//! loop:
//!   pop best pair p
//!   exact(p) < 0            -> drop every pair on p.frontier
//!   exact(p) >= next.key    -> commit p, drop pairs sharing agent or frontier
//!   otherwise               -> re-queue p keyed by exact(p)
//! ```
//!
//! Exact utilities (path planning) are only computed for pairs that reach the
//! head of the queue, at most once each.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::{debug, trace};

use super::utility::{FrontierUtility, exact_utility, optimistic_utility};
use crate::core::{AgentId, GridCoord};
use crate::frontier::{Frontier, FrontierId};
use crate::grid::OccupancyGrid;
use crate::planning::{Path, PathPlanner};

/// An agent taking part in allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub agent: AgentId,
    pub location: GridCoord,
}

/// Result of one allocation round.
#[derive(Clone, Debug, Default)]
pub struct Allocation {
    /// The frontier committed to the allocating agent
    pub own: Option<FrontierUtility>,
    /// Every committed pair, including `own`
    pub assignments: Vec<FrontierUtility>,
    /// Frontiers the allocating agent found unreachable
    pub unreachable: Vec<FrontierId>,
    /// Number of exact utilities computed
    pub exact_evaluations: usize,
}

/// Queue entry. Best pair sorts first; ties go to the lower frontier id,
/// then the lower agent id.
#[derive(Clone, Copy, Debug)]
struct QueueKey {
    priority: f64,
    frontier_id: FrontierId,
    agent: AgentId,
    pair: usize,
}

impl PartialEq for QueueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueKey {}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| self.frontier_id.cmp(&other.frontier_id))
            .then_with(|| self.agent.cmp(&other.agent))
            .then_with(|| self.pair.cmp(&other.pair))
    }
}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Pair {
    candidate: usize,
    frontier: usize,
    optimistic: f64,
    exact: Option<(f64, Path)>,
}

/// Allocates frontiers using one agent's belief grid and planner.
pub struct FrontierAllocator<'a> {
    grid: &'a OccupancyGrid,
    planner: &'a dyn PathPlanner,
    distance_exponent: f64,
}

impl<'a> FrontierAllocator<'a> {
    pub fn new(grid: &'a OccupancyGrid, planner: &'a dyn PathPlanner, distance_exponent: f64) -> Self {
        Self {
            grid,
            planner,
            distance_exponent,
        }
    }

    /// Run one round for `own` over `candidates` (which must include `own`
    /// to get an assignment for it).
    pub fn allocate(&self, own: AgentId, candidates: &[Candidate], frontiers: &[Frontier]) -> Allocation {
        let mut pairs = Vec::with_capacity(candidates.len() * frontiers.len());
        let mut queue = BTreeSet::new();
        for (ci, candidate) in candidates.iter().enumerate() {
            for (fi, frontier) in frontiers.iter().enumerate() {
                let optimistic =
                    optimistic_utility(candidate.location, frontier, self.distance_exponent);
                queue.insert(QueueKey {
                    priority: optimistic,
                    frontier_id: frontier.id(),
                    agent: candidate.agent,
                    pair: pairs.len(),
                });
                pairs.push(Pair {
                    candidate: ci,
                    frontier: fi,
                    optimistic,
                    exact: None,
                });
            }
        }

        let mut allocation = Allocation::default();
        while let Some(key) = queue.pop_first() {
            let pair = &mut pairs[key.pair];
            let candidate = candidates[pair.candidate];
            let frontier = &frontiers[pair.frontier];
            let frontier_index = pair.frontier;
            let candidate_index = pair.candidate;

            let exact = match &pair.exact {
                Some((value, _)) => *value,
                None => {
                    let (value, path) = exact_utility(
                        self.grid,
                        self.planner,
                        candidate.location,
                        frontier,
                        self.distance_exponent,
                    );
                    allocation.exact_evaluations += 1;
                    pair.exact = Some((value, path));
                    value
                }
            };

            if exact < 0.0 {
                trace!("{} cannot reach frontier at {}", candidate.agent, frontier.centre());
                queue.retain(|k| pairs[k.pair].frontier != frontier_index);
                if candidate.agent == own {
                    allocation.unreachable.push(frontier.id());
                }
                continue;
            }

            let dominates = queue.first().is_none_or(|next| exact >= next.priority);
            if !dominates {
                queue.insert(QueueKey {
                    priority: exact,
                    ..key
                });
                continue;
            }

            queue.retain(|k| {
                let other = &pairs[k.pair];
                other.frontier != frontier_index && other.candidate != candidate_index
            });

            let pair = &mut pairs[key.pair];
            let path = pair.exact.take().map(|(_, path)| path);
            let committed = FrontierUtility {
                agent: candidate.agent,
                agent_location: candidate.location,
                frontier: frontier.clone(),
                utility: exact,
                path,
            };
            trace!(
                "{} -> frontier at {} (optimistic {:.4}, exact {:.4})",
                committed.agent,
                frontier.centre(),
                pair.optimistic,
                exact
            );
            if committed.agent == own {
                allocation.own = Some(committed.clone());
            }
            allocation.assignments.push(committed);
        }

        debug!(
            "{} allocated {} of {} frontiers over {} agents ({} exact evaluations)",
            own,
            allocation.assignments.len(),
            frontiers.len(),
            candidates.len(),
            allocation.exact_evaluations
        );
        allocation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planning::GridPlanner;

    fn open_grid(width: usize, height: usize) -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(width, height);
        for c in grid.coords().collect::<Vec<_>>() {
            grid.set_free_space_at(c);
        }
        grid
    }

    fn frontier(y: i32, from: i32, to: i32) -> Frontier {
        Frontier::from_outline((from..=to).map(|x| GridCoord::new(x, y)).collect()).unwrap()
    }

    fn candidate(id: u32, x: i32, y: i32) -> Candidate {
        Candidate {
            agent: AgentId(id),
            location: GridCoord::new(x, y),
        }
    }

    #[test]
    fn test_closer_agent_wins_from_both_views() {
        let grid = open_grid(30, 30);
        let planner = GridPlanner::default();
        let f = frontier(25, 10, 14);
        let a1 = candidate(1, 12, 20);
        let a2 = candidate(2, 12, 2);
        let team = [a1, a2];

        let allocator = FrontierAllocator::new(&grid, &planner, 2.0);
        let (a2_exact, _) = exact_utility(&grid, &planner, a2.location, &f, 2.0);
        assert!(optimistic_utility(a1.location, &f, 2.0) >= a2_exact);

        let view_1 = allocator.allocate(a1.agent, &team, std::slice::from_ref(&f));
        let view_2 = allocator.allocate(a2.agent, &team, std::slice::from_ref(&f));

        assert_eq!(view_1.own.as_ref().map(|u| u.frontier.id()), Some(f.id()));
        assert!(view_2.own.is_none());
        assert_eq!(view_1.assignments.len(), 1);
        assert_eq!(view_2.assignments[0].agent, AgentId(1));
        // Only the winner ever needed an exact evaluation.
        assert_eq!(view_1.exact_evaluations, 1);
    }

    #[test]
    fn test_no_frontier_assigned_twice() {
        let grid = open_grid(40, 40);
        let planner = GridPlanner::default();
        let frontiers = vec![frontier(35, 2, 8), frontier(35, 30, 36), frontier(5, 30, 34)];
        let team = [
            candidate(1, 5, 30),
            candidate(2, 6, 28),
            candidate(3, 33, 30),
            candidate(4, 20, 20),
        ];
        let allocator = FrontierAllocator::new(&grid, &planner, 2.0);

        let views: Vec<Allocation> = team
            .iter()
            .map(|c| allocator.allocate(c.agent, &team, &frontiers))
            .collect();

        for view in &views {
            let mut ids: Vec<FrontierId> = view.assignments.iter().map(|u| u.frontier.id()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), view.assignments.len());

            let mut agents: Vec<AgentId> = view.assignments.iter().map(|u| u.agent).collect();
            agents.sort();
            agents.dedup();
            assert_eq!(agents.len(), view.assignments.len());
            assert_eq!(view.assignments.len(), 3);
        }

        // Every view agrees on the matching.
        let reference: Vec<(AgentId, FrontierId)> = views[0]
            .assignments
            .iter()
            .map(|u| (u.agent, u.frontier.id()))
            .collect();
        for view in &views[1..] {
            let other: Vec<(AgentId, FrontierId)> =
                view.assignments.iter().map(|u| (u.agent, u.frontier.id())).collect();
            assert_eq!(reference, other);
        }

        // An agent's own result matches the shared matching.
        for (c, view) in team.iter().zip(&views) {
            let own = view.own.as_ref().map(|u| u.frontier.id());
            let shared = reference.iter().find(|(a, _)| *a == c.agent).map(|(_, f)| *f);
            assert_eq!(own, shared);
        }
    }

    #[test]
    fn test_unreachable_frontier_reported_for_self() {
        let mut grid = open_grid(20, 20);
        for x in 0..20 {
            grid.set_obstacle_at(GridCoord::new(x, 10));
        }
        let planner = GridPlanner::default();
        let walled_off = frontier(15, 5, 9);
        let reachable = frontier(2, 12, 16);
        let team = [candidate(1, 7, 8)];
        let allocation = FrontierAllocator::new(&grid, &planner, 2.0).allocate(
            AgentId(1),
            &team,
            &[walled_off.clone(), reachable.clone()],
        );

        assert_eq!(allocation.unreachable, vec![walled_off.id()]);
        assert_eq!(allocation.own.map(|u| u.frontier.id()), Some(reachable.id()));
    }

    #[test]
    fn test_exact_requeue_lets_other_agent_win() {
        // a1 is close in a straight line but must walk around a long wall.
        let mut grid = open_grid(30, 30);
        for x in 0..28 {
            grid.set_obstacle_at(GridCoord::new(x, 15));
        }
        let planner = GridPlanner::default();
        let f = frontier(18, 3, 7);
        let a1 = candidate(1, 5, 13);
        let a2 = candidate(2, 5, 24);
        let allocation =
            FrontierAllocator::new(&grid, &planner, 2.0).allocate(a1.agent, &[a1, a2], &[f]);

        assert!(allocation.own.is_none());
        assert_eq!(allocation.assignments[0].agent, AgentId(2));
        assert_eq!(allocation.exact_evaluations, 2);
    }

    #[test]
    fn test_equal_utility_tie_breaks_by_frontier_then_agent() {
        let grid = open_grid(21, 21);
        let planner = GridPlanner::default();
        // Two mirror-image frontiers equidistant from a single agent.
        let left = frontier(10, 0, 0);
        let right = frontier(10, 20, 20);
        let team = [candidate(1, 10, 10)];
        let allocation =
            FrontierAllocator::new(&grid, &planner, 2.0).allocate(AgentId(1), &team, &[right, left.clone()]);
        assert_eq!(allocation.own.map(|u| u.frontier.id()), Some(left.id()));

        // Two agents equidistant from one frontier: the lower id wins.
        let f = frontier(20, 10, 10);
        let team = [candidate(7, 5, 20), candidate(3, 15, 20)];
        let allocation = FrontierAllocator::new(&grid, &planner, 2.0).allocate(AgentId(7), &team, &[f]);
        assert_eq!(allocation.assignments[0].agent, AgentId(3));
    }

    #[test]
    fn test_empty_inputs() {
        let grid = open_grid(5, 5);
        let planner = GridPlanner::default();
        let allocation =
            FrontierAllocator::new(&grid, &planner, 2.0).allocate(AgentId(1), &[candidate(1, 0, 0)], &[]);
        assert!(allocation.own.is_none());
        assert!(allocation.assignments.is_empty());
    }
}
