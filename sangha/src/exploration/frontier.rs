//! Frontier exploration with relay placement.

use tracing::{debug, info};

use super::state::{AgentRole, ExplorationState};
use super::walk::random_step;
use super::{AgentCore, ExplorationStrategy, FrontierChoice, StepAction, StepContext, StepDecision};
use crate::frontier::Frontier;
use crate::topology::{RelayDecision, RelayPolicy};

/// Frontier-based exploration driven by [`ExplorationState`].
///
/// Replans every `replan_interval` ticks, returns to the base per the
/// configured return policy, and runs the relay policy between replans.
#[derive(Clone, Debug, Default)]
pub struct FrontierStrategy {
    /// The last route was refused; plan exactly on the next return
    recent_env_error: bool,
}

impl FrontierStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn initial(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        if ctx.tick + 1 >= ctx.config.init_cycles {
            agent.set_state(ExplorationState::Explore);
        }
        StepDecision::route(random_step(agent))
    }

    fn explore_step(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        let replan = agent.stats.time_since_last_plan >= ctx.config.replan_interval
            || agent.state_timer() <= 1
            || !agent.has_valid_path();
        if replan {
            return self.explore(agent, ctx);
        }
        if let Some(decision) = self.process_relay(agent, ctx) {
            return decision;
        }
        let route = agent.follow_path();
        if route.is_empty() {
            return self.explore(agent, ctx);
        }
        StepDecision::route(route)
    }

    /// Replan: return checks, frontier extraction and allocation.
    fn explore(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        agent.stats.time_since_last_plan = 0;
        agent.update_stagnation(ctx.total_free);

        if Self::should_return(agent, ctx) {
            debug!(
                "{}: {:?} triggered after {} ticks without base contact",
                agent.id, ctx.config.return_policy, agent.stats.no_return_timer
            );
            agent.set_state(ExplorationState::ReturnToBase);
            return self.head_home(agent, ctx);
        }

        agent.calculate_frontiers(ctx);
        if ctx.relay_config.policy != RelayPolicy::None {
            agent.refresh_topology(ctx);
        }

        let percentage = agent.percentage_known(ctx.total_free);
        if agent.frontiers().is_empty()
            || agent.stats.stagnation > ctx.config.stagnation_limit
            || percentage >= ctx.config.goal_percent
        {
            info!(
                "{}: mission complete ({:.1}% known, {} frontiers, stagnation {})",
                agent.id,
                percentage,
                agent.frontiers().len(),
                agent.stats.stagnation
            );
            return self.complete_mission(agent, ctx);
        }

        let (frontier, path) = match agent.choose_frontier(ctx) {
            FrontierChoice::Chosen { frontier, path } => (frontier, path),
            FrontierChoice::ClaimedByTeam => {
                debug!("{}: every frontier taken by the team, wandering", agent.id);
                agent.frontier = None;
                agent.invalidate_path();
                return StepDecision::route(random_step(agent));
            }
            FrontierChoice::Exhausted => {
                info!("{}: no reachable frontier left", agent.id);
                return self.complete_mission(agent, ctx);
            }
        };

        let overlapping = Self::overlaps_teammate(agent, &frontier, ctx);
        agent.frontier = Some(frontier);
        agent.path = Some(path);
        if overlapping {
            agent.invalidate_path();
            return StepDecision::route(random_step(agent));
        }
        StepDecision::route(agent.follow_path())
    }

    fn should_return(agent: &AgentCore, ctx: &StepContext<'_>) -> bool {
        if agent.has_base_link {
            return false;
        }
        let base_belief = agent.grid.num_free_known_at_base();
        let new_info = agent.grid.num_free_cells().saturating_sub(base_belief);
        ctx.config.return_policy.should_return(
            agent.stats.no_return_timer,
            ctx.config.periodic_return_period,
            agent.stats.max_stagnation,
            base_belief,
            new_info,
            ctx.config.target_info_ratio,
        )
    }

    /// A linked explorer stands on our cell, or a lower-numbered one heads
    /// for the same frontier.
    fn overlaps_teammate(agent: &AgentCore, frontier: &Frontier, ctx: &StepContext<'_>) -> bool {
        agent.teammates.values().any(|t| {
            let peer = t.has_link && !t.stationary && t.role == AgentRole::Explorer;
            let same_target = t.id < agent.id
                && t
                    .target
                    .is_some_and(|g| g.distance(&frontier.centre()) < ctx.config.overlap_radius);
            peer && (t.location == agent.location || same_target)
        })
    }

    fn complete_mission(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        agent.mission_complete = true;
        agent.frontier = None;
        agent.set_state(ExplorationState::ReturnToBase);
        self.head_home(agent, ctx)
    }

    fn head_home(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        let exact = std::mem::take(&mut self.recent_env_error);
        if agent.plan_to(ctx, ctx.base, exact) {
            let route = agent.follow_path();
            if !route.is_empty() {
                return StepDecision::route(route);
            }
        }
        StepDecision::route(random_step(agent))
    }

    fn return_to_base(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        if agent.has_base_link {
            if agent.mission_complete {
                agent.path = None;
                agent.set_state(ExplorationState::Finished);
                return StepDecision::stay();
            }
            agent.set_state(ExplorationState::Explore);
            return self.explore(agent, ctx);
        }
        if agent.state_timer() <= 1 || !agent.has_valid_path() {
            return self.head_home(agent, ctx);
        }
        let route = agent.follow_path();
        if route.is_empty() {
            return self.head_home(agent, ctx);
        }
        StepDecision::route(route)
    }

    fn process_relay(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> Option<StepDecision> {
        match agent.decide_relay(ctx)? {
            RelayDecision::Drop => {
                agent.relay_target = None;
                agent.set_state(ExplorationState::SettingRelay);
                Some(StepDecision::stay())
            }
            RelayDecision::Take(relay) => {
                agent.relay_target = Some(relay);
                agent.set_state(ExplorationState::TakingRelay);
                Some(StepDecision::stay())
            }
            RelayDecision::GoTo { target, relay } => {
                let path = ctx.planner.plan(&agent.grid, agent.location, target, true);
                if !path.is_valid() {
                    debug!("{}: relay site {} unreachable", agent.id, target);
                    return None;
                }
                agent.path = Some(path);
                agent.relay_target = relay;
                agent.set_state(ExplorationState::GoToRelay);
                Some(StepDecision::route(agent.follow_path()))
            }
        }
    }

    fn go_to_relay(&mut self, agent: &mut AgentCore) -> StepDecision {
        if agent.target() == Some(agent.location) {
            agent.restore_previous_state();
            let relay_here = agent.relay_target.or_else(|| {
                agent
                    .relay_sites()
                    .iter()
                    .find(|r| r.location == agent.location)
                    .map(|r| r.id)
            });
            agent.relay_target = relay_here;
            agent.set_state(if relay_here.is_some() {
                ExplorationState::TakingRelay
            } else {
                ExplorationState::SettingRelay
            });
            return StepDecision::stay();
        }

        let route = if agent.has_valid_path() {
            agent.follow_path()
        } else {
            Vec::new()
        };
        if route.is_empty() {
            debug!("{}: lost the way to the relay site", agent.id);
            agent.relay_target = None;
            agent.restore_previous_state();
            return StepDecision::route(random_step(agent));
        }
        StepDecision::route(route)
    }
}

impl ExplorationStrategy for FrontierStrategy {
    fn name(&self) -> &'static str {
        "frontier"
    }

    fn take_step(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        agent.begin_step();
        if agent.env_error {
            agent.env_error = false;
            agent.invalidate_path();
            self.recent_env_error = true;
        }

        let decision = match agent.state() {
            ExplorationState::Initial => self.initial(agent, ctx),
            ExplorationState::Explore => self.explore_step(agent, ctx),
            ExplorationState::ReturnToBase => self.return_to_base(agent, ctx),
            ExplorationState::SettingRelay => {
                agent.restore_previous_state();
                StepDecision::action(StepAction::DropRelay)
            }
            ExplorationState::TakingRelay => {
                agent.restore_previous_state();
                match agent.relay_target.take() {
                    Some(relay) => StepDecision::action(StepAction::PickUpRelay(relay)),
                    None => StepDecision::stay(),
                }
            }
            ExplorationState::GoToRelay => self.go_to_relay(agent),
            ExplorationState::Finished => StepDecision::stay(),
        };

        agent.end_step();
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AgentId, GridCoord};
    use crate::exploration::TeammateInfo;
    use crate::exploration::testing::{Fixture, explorer, half_known_grid, open_grid};
    use crate::grid::OccupancyGrid;
    use crate::planning::{GridPlanner, Path, PathPlanner};

    /// Plans like the grid planner but hands exact paths ending in column
    /// `stale_x` back already invalidated.
    struct StaleExactPlanner {
        inner: GridPlanner,
        stale_x: i32,
    }

    impl PathPlanner for StaleExactPlanner {
        fn plan(&self, grid: &OccupancyGrid, start: GridCoord, goal: GridCoord, exact: bool) -> Path {
            let mut path = self.inner.plan(grid, start, goal, exact);
            if exact && goal.x == self.stale_x {
                path.invalidate();
            }
            path
        }
    }

    #[test]
    fn test_initial_walks_until_init_cycles() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(1), GridCoord::new(5, 5), open_grid(10, 10));

        strategy.take_step(&mut agent, &fixture.ctx(0));
        strategy.take_step(&mut agent, &fixture.ctx(1));
        assert_eq!(agent.state(), ExplorationState::Initial);
        let decision = strategy.take_step(&mut agent, &fixture.ctx(2));
        assert_eq!(agent.state(), ExplorationState::Explore);
        assert_eq!(decision.route.len(), 1);
    }

    #[test]
    fn test_explore_heads_for_frontier() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(1), GridCoord::new(2, 5), half_known_grid(20, 10, 8));
        agent.set_state(ExplorationState::Explore);

        let decision = strategy.take_step(&mut agent, &fixture.ctx(5));
        assert_eq!(agent.state(), ExplorationState::Explore);
        let frontier = agent.frontier.clone().unwrap();
        assert_eq!(frontier.centre().x, 7);
        assert_eq!(agent.target(), Some(frontier.centre()));
        assert_eq!(decision.route, vec![GridCoord::new(3, 5)]);
    }

    #[test]
    fn test_follows_path_between_replans() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(1), GridCoord::new(2, 5), half_known_grid(20, 10, 8));
        agent.set_state(ExplorationState::Explore);

        let first = strategy.take_step(&mut agent, &fixture.ctx(5));
        agent.location = first.destination().unwrap();
        let second = strategy.take_step(&mut agent, &fixture.ctx(6));
        assert_eq!(agent.stats.time_since_last_plan, 2);
        assert_eq!(second.route, vec![GridCoord::new(4, 5)]);
    }

    #[test]
    fn test_nothing_left_returns_then_finishes() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(1), GridCoord::new(5, 5), open_grid(10, 10));
        agent.set_state(ExplorationState::Explore);

        let decision = strategy.take_step(&mut agent, &fixture.ctx(4));
        assert!(agent.mission_complete);
        assert_eq!(agent.state(), ExplorationState::ReturnToBase);
        assert_eq!(decision.route, vec![GridCoord::new(4, 4)]);

        agent.has_base_link = true;
        strategy.take_step(&mut agent, &fixture.ctx(5));
        assert_eq!(agent.state(), ExplorationState::Finished);
        assert!(strategy.take_step(&mut agent, &fixture.ctx(6)).route.is_empty());
    }

    #[test]
    fn test_unreachable_frontiers_blacklisted() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        let mut grid = OccupancyGrid::new(12, 6);
        for y in 0..6 {
            for x in 0..9 {
                let c = GridCoord::new(x, y);
                if x == 5 {
                    grid.set_obstacle_at(c);
                } else {
                    grid.set_free_space_at(c);
                }
            }
        }
        let mut agent = explorer(AgentId(1), GridCoord::new(1, 1), grid);
        agent.set_state(ExplorationState::Explore);

        strategy.take_step(&mut agent, &fixture.ctx(4));
        assert!(agent.mission_complete);
        assert_eq!(agent.state(), ExplorationState::ReturnToBase);
        assert_eq!(agent.blacklist.len(), 1);
    }

    #[test]
    fn test_unreachable_frontier_skipped_for_reachable_one() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        // Free for 3 <= x < 12 with a wall at x = 9 sealing off the east frontier
        let mut grid = OccupancyGrid::new(16, 6);
        for y in 0..6 {
            for x in 3..12 {
                let c = GridCoord::new(x, y);
                if x == 9 {
                    grid.set_obstacle_at(c);
                } else {
                    grid.set_free_space_at(c);
                }
            }
        }
        let mut agent = explorer(AgentId(1), GridCoord::new(6, 2), grid);
        agent.set_state(ExplorationState::Explore);

        let decision = strategy.take_step(&mut agent, &fixture.ctx(4));
        assert!(!agent.mission_complete);
        assert_eq!(agent.state(), ExplorationState::Explore);
        assert_eq!(agent.blacklist.len(), 1);
        let frontier = agent.frontier.clone().unwrap();
        assert_eq!(frontier.centre().x, 3);
        let sealed = agent.frontiers().iter().find(|f| f.centre().x == 11).unwrap();
        assert!(agent.blacklist.rejects(sealed));
        assert_eq!(decision.route.len(), 1);
    }

    #[test]
    fn test_invalid_exact_path_falls_to_next_frontier() {
        let fixture = Fixture::default();
        let planner = StaleExactPlanner {
            inner: GridPlanner::default(),
            stale_x: 14,
        };
        let ctx = StepContext {
            planner: &planner,
            ..fixture.ctx(4)
        };
        let mut strategy = FrontierStrategy::new();
        // Free for 3 <= x < 15: the east frontier is nearer but its path spoils
        let mut grid = OccupancyGrid::new(20, 6);
        for y in 0..6 {
            for x in 3..15 {
                grid.set_free_space_at(GridCoord::new(x, y));
            }
        }
        let mut agent = explorer(AgentId(1), GridCoord::new(10, 2), grid);
        agent.set_state(ExplorationState::Explore);

        strategy.take_step(&mut agent, &ctx);
        assert!(!agent.mission_complete);
        let east = agent.frontiers().iter().find(|f| f.centre().x == 14).unwrap().id();
        assert!(agent.blacklist.contains(&east));
        assert_eq!(agent.blacklist.len(), 1);
        assert_eq!(agent.frontier.as_ref().map(|f| f.centre().x), Some(3));
        assert!(agent.has_valid_path());
    }

    #[test]
    fn test_frontier_claimed_by_team_keeps_exploring() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(1), GridCoord::new(0, 5), half_known_grid(20, 10, 8));
        agent.set_state(ExplorationState::Explore);
        agent.teammates.insert(
            AgentId(2),
            TeammateInfo {
                id: AgentId(2),
                role: AgentRole::Explorer,
                location: GridCoord::new(6, 5),
                comm_range: 25.0,
                stationary: false,
                has_link: true,
                has_base_link: false,
                last_contact: 5,
                target: None,
            },
        );

        let decision = strategy.take_step(&mut agent, &fixture.ctx(5));
        assert!(!agent.mission_complete);
        assert_eq!(agent.state(), ExplorationState::Explore);
        assert!(agent.frontier.is_none());
        assert!(agent.blacklist.is_empty());
        assert_eq!(decision.route.len(), 1);

        // Once the teammate is forgotten the frontier is ours again
        let later = fixture.config.remember_teammate_period + 6;
        agent.location = GridCoord::new(0, 5);
        strategy.take_step(&mut agent, &fixture.ctx(later));
        assert_eq!(agent.frontier.as_ref().map(|f| f.centre()), Some(GridCoord::new(7, 5)));
        assert!(!agent.mission_complete);
    }

    #[test]
    fn test_return_to_base_resumes_exploring_on_contact() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(1), GridCoord::new(2, 5), half_known_grid(20, 10, 8));
        agent.set_state(ExplorationState::ReturnToBase);

        strategy.take_step(&mut agent, &fixture.ctx(0));
        assert_eq!(agent.target(), Some(fixture.base));

        agent.has_base_link = true;
        strategy.take_step(&mut agent, &fixture.ctx(1));
        assert_eq!(agent.state(), ExplorationState::Explore);
        assert!(agent.frontier.is_some());
    }

    #[test]
    fn test_periodic_return_after_silence() {
        let mut fixture = Fixture::default();
        fixture.config.return_policy = crate::exploration::ReturnPolicy::PeriodicReturn;
        fixture.config.periodic_return_period = 5;
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(1), GridCoord::new(2, 5), half_known_grid(20, 10, 8));
        agent.set_state(ExplorationState::Explore);
        agent.stats.no_return_timer = 6;

        strategy.take_step(&mut agent, &fixture.ctx(10));
        assert_eq!(agent.state(), ExplorationState::ReturnToBase);
        assert!(!agent.mission_complete);
    }

    #[test]
    fn test_overlap_forces_random_step() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(2), GridCoord::new(6, 5), half_known_grid(20, 10, 8));
        agent.set_state(ExplorationState::Explore);
        agent.teammates.insert(
            AgentId(1),
            TeammateInfo {
                id: AgentId(1),
                role: AgentRole::Explorer,
                location: GridCoord::new(0, 9),
                comm_range: 25.0,
                stationary: false,
                has_link: true,
                has_base_link: true,
                last_contact: 3,
                target: Some(GridCoord::new(7, 5)),
            },
        );

        let decision = strategy.take_step(&mut agent, &fixture.ctx(3));
        assert_eq!(agent.frontier.as_ref().map(|f| f.centre()), Some(GridCoord::new(7, 5)));
        assert!(!agent.has_valid_path());
        assert_eq!(decision.route.len(), 1);
    }

    #[test]
    fn test_env_error_invalidates_path() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(1), GridCoord::new(2, 5), half_known_grid(20, 10, 8));
        agent.set_state(ExplorationState::ReturnToBase);
        strategy.take_step(&mut agent, &fixture.ctx(0));
        strategy.take_step(&mut agent, &fixture.ctx(1));

        agent.env_error = true;
        let decision = strategy.take_step(&mut agent, &fixture.ctx(2));
        assert!(!agent.env_error);
        assert!(!strategy.recent_env_error);
        assert!(!decision.route.is_empty());
    }

    #[test]
    fn test_range_border_drop_cycle() {
        let mut fixture = Fixture::default();
        fixture.relay_config.policy = RelayPolicy::RangeBorder;
        fixture.total_free = 300;
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(1), GridCoord::new(9, 0), half_known_grid(30, 10, 12)).with_relays(1);
        agent.params.comm_range = 10.0;
        agent.set_state(ExplorationState::Explore);

        // Replan, then relay processing on the next tick
        strategy.take_step(&mut agent, &fixture.ctx(3));
        let waiting = strategy.take_step(&mut agent, &fixture.ctx(4));
        assert!(waiting.route.is_empty());
        assert_eq!(agent.state(), ExplorationState::SettingRelay);

        let drop = strategy.take_step(&mut agent, &fixture.ctx(5));
        assert_eq!(drop.action, Some(StepAction::DropRelay));
        assert_eq!(agent.state(), ExplorationState::Explore);
    }

    #[test]
    fn test_go_to_relay_arrival_takes_relay() {
        let fixture = Fixture::default();
        let mut strategy = FrontierStrategy::new();
        let mut agent = explorer(AgentId(1), GridCoord::new(2, 2), open_grid(8, 8));
        agent.set_state(ExplorationState::Explore);
        assert!(agent.plan_to(&fixture.ctx(0), GridCoord::new(3, 2), true));
        agent.relay_target = Some(AgentId(5));
        agent.set_state(ExplorationState::GoToRelay);

        let step = strategy.take_step(&mut agent, &fixture.ctx(1));
        assert_eq!(step.route, vec![GridCoord::new(3, 2)]);
        agent.location = GridCoord::new(3, 2);

        strategy.take_step(&mut agent, &fixture.ctx(2));
        assert_eq!(agent.state(), ExplorationState::TakingRelay);
        assert_eq!(agent.previous_state(), ExplorationState::Explore);

        let take = strategy.take_step(&mut agent, &fixture.ctx(3));
        assert_eq!(take.action, Some(StepAction::PickUpRelay(AgentId(5))));
        assert_eq!(agent.state(), ExplorationState::Explore);
    }
}
