//! Explorer/relay pairs meeting at agreed rendezvous points.

use tracing::{debug, info};

use super::state::{AgentRole, ExplorationState};
use super::walk::random_step;
use super::{AgentCore, ExplorationStrategy, StepContext, StepDecision};
use crate::core::{AgentId, GridCoord};
use crate::coordination::RendezvousRegistry;
use crate::frontier::Frontier;
use crate::planning::Path;

const MIN_RETURN_TIMER: u64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RoleState {
    Exploring,
    ReturnToBase,
    RunningToRendezvous,
    WaitingAtRendezvous,
}

impl RoleState {
    fn exploration_state(self) -> ExplorationState {
        match self {
            RoleState::Exploring => ExplorationState::Explore,
            RoleState::ReturnToBase => ExplorationState::ReturnToBase,
            RoleState::RunningToRendezvous | RoleState::WaitingAtRendezvous => {
                ExplorationState::GoToRelay
            }
        }
    }
}

/// Role-based exploration.
///
/// The explorer explores until its return timer runs out, then goes to the
/// agreed rendezvous and waits. The relay ferries knowledge: it goes to the
/// base, then to the rendezvous, and waits. When the two meet the explorer
/// picks its next frontier and publishes the midpoint of the way there as
/// the next rendezvous; the relay acknowledges and heads home.
#[derive(Clone, Debug)]
pub struct RoleBasedStrategy {
    role: AgentRole,
    partner: AgentId,
    /// Key of the pair in the rendezvous registry
    explorer: AgentId,
    state: RoleState,
    return_timer: u64,
    time_since_last_comm: u64,
    still_in_comms: bool,
    destination: Option<GridCoord>,
    seen_round: u64,
}

impl RoleBasedStrategy {
    /// Strategy for `agent`, paired with `partner`. The explorer side
    /// registers the pair, meeting first at `base`.
    pub fn new(
        agent: &AgentCore,
        partner: AgentId,
        registry: &RendezvousRegistry,
        base: GridCoord,
        rendezvous_period: u64,
    ) -> Self {
        let explorer = match agent.role {
            AgentRole::Explorer => {
                registry.register_pair(agent.id, partner, base);
                agent.id
            }
            AgentRole::Relay => partner,
        };
        Self {
            role: agent.role,
            partner,
            explorer,
            state: RoleState::RunningToRendezvous,
            return_timer: rendezvous_period.max(1),
            time_since_last_comm: u64::MAX / 2,
            still_in_comms: false,
            destination: None,
            seen_round: 0,
        }
    }

    fn is_explorer(&self) -> bool {
        self.role == AgentRole::Explorer
    }

    fn partner_linked(&self, agent: &AgentCore) -> bool {
        agent.teammates.get(&self.partner).is_some_and(|t| t.has_link)
    }

    /// Linked again after a quiet spell.
    fn may_meet(&self, agent: &AgentCore, ctx: &StepContext<'_>) -> bool {
        self.partner_linked(agent)
            && self.time_since_last_comm >= ctx.config.comm_timeout
            && !self.still_in_comms
    }

    fn rendezvous_point(&self, ctx: &StepContext<'_>) -> GridCoord {
        ctx.coordination
            .rendezvous
            .rendezvous(self.explorer)
            .map_or(ctx.base, |r| r.point)
    }

    fn partner_finished(&self, ctx: &StepContext<'_>) -> bool {
        ctx.coordination
            .rendezvous
            .rendezvous(self.explorer)
            .is_some_and(|r| r.finished)
    }

    /// Plan exactly, falling back to a plan through unknown space.
    fn plan(agent: &AgentCore, ctx: &StepContext<'_>, goal: GridCoord) -> Path {
        let path = ctx.planner.plan(&agent.grid, agent.location, goal, true);
        if path.is_valid() {
            return path;
        }
        ctx.planner.plan(&agent.grid, agent.location, goal, false)
    }

    fn follow_or_wander(agent: &mut AgentCore) -> StepDecision {
        let route = agent.follow_path();
        if route.is_empty() {
            return StepDecision::route(random_step(agent));
        }
        StepDecision::route(route)
    }

    /// Largest frontier, skipping one per linked explorer with a lower id so
    /// that explorers meeting each other spread out.
    fn next_frontier(&self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> Option<Frontier> {
        agent.calculate_frontiers(ctx);
        let frontiers = agent.frontiers();
        if frontiers.is_empty() {
            return None;
        }
        let skip = agent
            .teammates
            .values()
            .filter(|t| t.has_link && t.role == AgentRole::Explorer && !t.stationary && t.id < agent.id)
            .count();
        Some(frontiers[skip % frontiers.len()].clone())
    }

    /// Choose a frontier and plan to it, blacklisting unreachable ones.
    fn plan_to_frontier(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> bool {
        let mut attempts = agent.frontiers().len().max(1) + 1;
        while attempts > 0 {
            attempts -= 1;
            let Some(frontier) = self.next_frontier(agent, ctx) else {
                break;
            };
            let path = ctx.planner.plan(&agent.grid, agent.location, frontier.centre(), true);
            if path.is_valid() && path.length() > 0.0 {
                self.destination = Some(frontier.centre());
                agent.frontier = Some(frontier);
                agent.path = Some(path);
                return true;
            }
            debug!("{}: frontier at {} unreachable", agent.id, frontier.centre());
            agent.blacklist.insert(frontier.id());
        }
        self.destination = None;
        agent.frontier = None;
        false
    }

    /// Relay round trip: us to base, then base to the rendezvous.
    fn return_timer_estimate(agent: &AgentCore, ctx: &StepContext<'_>, rendezvous: GridCoord) -> u64 {
        let to_base = ctx.planner.plan(&agent.grid, agent.location, ctx.base, false).length();
        let to_rendezvous = ctx.planner.plan(&agent.grid, ctx.base, rendezvous, false).length();
        let ticks = ((to_base + to_rendezvous) / agent.params.speed as f64) as u64;
        ticks.max(MIN_RETURN_TIMER)
    }

    fn meet(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        debug!("{}: met partner {}", agent.id, self.partner);
        self.still_in_comms = true;
        self.time_since_last_comm = 0;
        agent.invalidate_path();

        if !self.is_explorer() {
            let registry = &ctx.coordination.rendezvous;
            if let Some(rendezvous) = registry.rendezvous(self.explorer) {
                self.seen_round = rendezvous.round;
                registry.acknowledge(self.explorer, rendezvous.round);
            }
            self.state = RoleState::ReturnToBase;
            agent.path = Some(Self::plan(agent, ctx, ctx.base));
            return Self::follow_or_wander(agent);
        }

        self.destination = None;
        if !self.plan_to_frontier(agent, ctx) {
            return self.finish_exploring(agent, ctx);
        }
        let midpoint = agent
            .path
            .as_ref()
            .and_then(Path::midpoint)
            .unwrap_or(agent.location);
        ctx.coordination.rendezvous.set_rendezvous(agent.id, midpoint);
        // Everything we own now travels home with the relay
        agent.grid.set_owned_cells_relayed();
        self.return_timer = Self::return_timer_estimate(agent, ctx, midpoint);
        debug!(
            "{}: next rendezvous {} in {} ticks",
            agent.id, midpoint, self.return_timer
        );
        self.state = RoleState::Exploring;
        Self::follow_or_wander(agent)
    }

    fn finish_exploring(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        info!("{}: no frontiers left, heading home", agent.id);
        agent.mission_complete = true;
        ctx.coordination.rendezvous.set_finished(self.explorer);
        self.state = RoleState::ReturnToBase;
        agent.path = Some(Self::plan(agent, ctx, ctx.base));
        Self::follow_or_wander(agent)
    }

    fn explore(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        self.return_timer = self.return_timer.saturating_sub(1);
        if self.return_timer == 0 {
            self.state = RoleState::RunningToRendezvous;
            self.destination = None;
            agent.path = Some(Self::plan(agent, ctx, self.rendezvous_point(ctx)));
            return self.run_to_rendezvous(agent, ctx);
        }

        if agent.env_error {
            agent.env_error = false;
            agent.path = None;
            self.destination = None;
        }

        if self.may_meet(agent, ctx) {
            return self.meet(agent, ctx);
        }

        let en_route = agent
            .path
            .as_ref()
            .is_some_and(|p| p.is_valid() && !p.is_finished());
        if en_route {
            return Self::follow_or_wander(agent);
        }
        if !self.plan_to_frontier(agent, ctx) {
            self.state = RoleState::RunningToRendezvous;
            agent.path = Some(Self::plan(agent, ctx, self.rendezvous_point(ctx)));
            return self.run_to_rendezvous(agent, ctx);
        }
        Self::follow_or_wander(agent)
    }

    fn return_to_base(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        if agent.env_error {
            agent.env_error = false;
            agent.path = None;
        }
        if !agent.has_valid_path() {
            agent.path = Some(Self::plan(agent, ctx, ctx.base));
        }

        if !self.is_explorer() && self.may_meet(agent, ctx) {
            return self.meet(agent, ctx);
        }

        if agent.has_base_link {
            if agent.mission_complete || self.partner_finished(ctx) {
                agent.path = None;
                agent.set_state(ExplorationState::Finished);
                return StepDecision::stay();
            }
            if !self.is_explorer() {
                self.state = RoleState::RunningToRendezvous;
                agent.path = Some(Self::plan(agent, ctx, self.rendezvous_point(ctx)));
                return self.run_to_rendezvous(agent, ctx);
            }
        }
        Self::follow_or_wander(agent)
    }

    fn run_to_rendezvous(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        if self.may_meet(agent, ctx) {
            return self.meet(agent, ctx);
        }

        let point = self.rendezvous_point(ctx);
        if agent.location == point {
            debug!("{}: reached rendezvous {}", agent.id, point);
            agent.path = None;
            self.state = RoleState::WaitingAtRendezvous;
            return self.wait_at_rendezvous(agent, ctx);
        }

        if agent.env_error {
            agent.env_error = false;
            agent.path = None;
        }
        let stale = agent.target() != Some(point);
        if stale || !agent.has_valid_path() {
            agent.path = Some(Self::plan(agent, ctx, point));
        }
        Self::follow_or_wander(agent)
    }

    fn wait_at_rendezvous(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        let registry = &ctx.coordination.rendezvous;
        let moved = !self.is_explorer() && registry.is_changed(self.explorer, self.seen_round);
        if moved && let Some(rendezvous) = registry.rendezvous(self.explorer) {
            self.seen_round = rendezvous.round;
        }
        if moved || agent.location != self.rendezvous_point(ctx) {
            self.state = RoleState::RunningToRendezvous;
            return self.run_to_rendezvous(agent, ctx);
        }
        if self.partner_linked(agent) {
            return self.meet(agent, ctx);
        }
        if !self.is_explorer() && self.partner_finished(ctx) {
            self.state = RoleState::ReturnToBase;
            agent.path = Some(Self::plan(agent, ctx, ctx.base));
            return Self::follow_or_wander(agent);
        }
        StepDecision::stay()
    }
}

impl ExplorationStrategy for RoleBasedStrategy {
    fn name(&self) -> &'static str {
        "role_based"
    }

    fn take_step(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        agent.begin_step();
        let decision = if ctx.tick == 0 || agent.state().is_terminal() {
            StepDecision::stay()
        } else {
            if !self.partner_linked(agent) {
                self.still_in_comms = false;
                self.time_since_last_comm = self.time_since_last_comm.saturating_add(1);
            }
            match self.state {
                RoleState::Exploring => self.explore(agent, ctx),
                RoleState::ReturnToBase => self.return_to_base(agent, ctx),
                RoleState::RunningToRendezvous => self.run_to_rendezvous(agent, ctx),
                RoleState::WaitingAtRendezvous => self.wait_at_rendezvous(agent, ctx),
            }
        };
        if !agent.state().is_terminal() {
            agent.set_state(self.state.exploration_state());
        }
        agent.end_step();
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exploration::testing::{Fixture, explorer, half_known_grid};
    use crate::exploration::{AgentParams, TeammateInfo};

    fn link(agent: &mut AgentCore, partner: AgentId, role: AgentRole, location: GridCoord, linked: bool) {
        agent.teammates.insert(
            partner,
            TeammateInfo {
                id: partner,
                role,
                location,
                comm_range: 25.0,
                stationary: false,
                has_link: linked,
                has_base_link: false,
                last_contact: 0,
                target: None,
            },
        );
    }

    fn relay(id: AgentId, location: GridCoord) -> AgentCore {
        AgentCore::new(
            id,
            AgentRole::Relay,
            location,
            AgentParams::default(),
            half_known_grid(20, 10, 8),
            3,
        )
    }

    #[test]
    fn test_explorer_registers_pair_at_base() {
        let fixture = Fixture::default();
        let agent = explorer(AgentId(1), GridCoord::new(1, 1), half_known_grid(20, 10, 8));
        let _strategy =
            RoleBasedStrategy::new(&agent, AgentId(2), &fixture.coordination.rendezvous, fixture.base, 50);
        let registry = &fixture.coordination.rendezvous;
        assert_eq!(registry.relay_of(AgentId(1)), Some(AgentId(2)));
        assert_eq!(registry.rendezvous(AgentId(1)).map(|r| r.point), Some(fixture.base));
    }

    #[test]
    fn test_meeting_publishes_midpoint_rendezvous() {
        let fixture = Fixture::default();
        let mut agent = explorer(AgentId(1), GridCoord::new(1, 5), half_known_grid(20, 10, 8));
        let mut strategy =
            RoleBasedStrategy::new(&agent, AgentId(2), &fixture.coordination.rendezvous, fixture.base, 50);
        link(&mut agent, AgentId(2), AgentRole::Relay, GridCoord::new(1, 4), true);

        assert!(strategy.take_step(&mut agent, &fixture.ctx(0)).route.is_empty());
        let decision = strategy.take_step(&mut agent, &fixture.ctx(1));

        let rendezvous = fixture.coordination.rendezvous.rendezvous(AgentId(1)).unwrap();
        assert_eq!(rendezvous.round, 1);
        assert_eq!(rendezvous.point, GridCoord::new(4, 5));
        assert_eq!(agent.state(), ExplorationState::Explore);
        assert_eq!(decision.route, vec![GridCoord::new(2, 5)]);
        assert!(strategy.return_timer >= MIN_RETURN_TIMER);
        // Owned cells were handed to the relay
        assert!(agent.grid.owned_cells().is_empty());
    }

    #[test]
    fn test_explorer_heads_to_rendezvous_when_timer_expires() {
        let fixture = Fixture::default();
        let mut agent = explorer(AgentId(1), GridCoord::new(6, 5), half_known_grid(20, 10, 8));
        let mut strategy =
            RoleBasedStrategy::new(&agent, AgentId(2), &fixture.coordination.rendezvous, fixture.base, 1);
        link(&mut agent, AgentId(2), AgentRole::Relay, GridCoord::new(0, 0), false);
        strategy.state = RoleState::Exploring;

        strategy.take_step(&mut agent, &fixture.ctx(3));
        assert_eq!(strategy.state, RoleState::RunningToRendezvous);
        assert_eq!(agent.state(), ExplorationState::GoToRelay);
        assert_eq!(agent.target(), Some(fixture.base));
    }

    #[test]
    fn test_relay_acknowledges_and_ferries_home() {
        let fixture = Fixture::default();
        let explorer_core = explorer(AgentId(1), GridCoord::new(6, 5), half_known_grid(20, 10, 8));
        let _explorer =
            RoleBasedStrategy::new(&explorer_core, AgentId(2), &fixture.coordination.rendezvous, fixture.base, 50);
        let registry = &fixture.coordination.rendezvous;
        let round = registry.set_rendezvous(AgentId(1), GridCoord::new(6, 5)).unwrap();

        let mut agent = relay(AgentId(2), GridCoord::new(6, 4));
        let mut strategy = RoleBasedStrategy::new(&agent, AgentId(1), registry, fixture.base, 50);
        link(&mut agent, AgentId(1), AgentRole::Explorer, GridCoord::new(6, 5), true);

        strategy.take_step(&mut agent, &fixture.ctx(1));
        assert!(registry.rendezvous(AgentId(1)).unwrap().acknowledged);
        assert_eq!(strategy.seen_round, round);
        assert_eq!(agent.state(), ExplorationState::ReturnToBase);
        assert_eq!(agent.target(), Some(fixture.base));

        // Back at base: off to the rendezvous
        agent.has_base_link = true;
        link(&mut agent, AgentId(1), AgentRole::Explorer, GridCoord::new(6, 5), false);
        strategy.take_step(&mut agent, &fixture.ctx(2));
        assert_eq!(strategy.state, RoleState::RunningToRendezvous);
        assert_eq!(agent.target(), Some(GridCoord::new(6, 5)));
    }

    #[test]
    fn test_waiting_relay_follows_moved_rendezvous() {
        let fixture = Fixture::default();
        let explorer_core = explorer(AgentId(1), GridCoord::new(6, 5), half_known_grid(20, 10, 8));
        let _explorer =
            RoleBasedStrategy::new(&explorer_core, AgentId(2), &fixture.coordination.rendezvous, fixture.base, 50);
        let registry = &fixture.coordination.rendezvous;

        let mut agent = relay(AgentId(2), fixture.base);
        let mut strategy = RoleBasedStrategy::new(&agent, AgentId(1), registry, fixture.base, 50);
        link(&mut agent, AgentId(1), AgentRole::Explorer, GridCoord::new(6, 5), false);

        strategy.take_step(&mut agent, &fixture.ctx(1));
        assert_eq!(strategy.state, RoleState::WaitingAtRendezvous);
        assert!(strategy.take_step(&mut agent, &fixture.ctx(2)).route.is_empty());

        registry.set_rendezvous(AgentId(1), GridCoord::new(3, 3));
        let decision = strategy.take_step(&mut agent, &fixture.ctx(3));
        assert_eq!(strategy.state, RoleState::RunningToRendezvous);
        assert_eq!(decision.route, vec![GridCoord::new(1, 1)]);
    }

    #[test]
    fn test_explorer_without_frontiers_finishes_at_base() {
        let fixture = Fixture::default();
        let mut agent = explorer(AgentId(1), GridCoord::new(2, 2), crate::exploration::testing::open_grid(6, 6));
        let mut strategy =
            RoleBasedStrategy::new(&agent, AgentId(2), &fixture.coordination.rendezvous, fixture.base, 50);
        link(&mut agent, AgentId(2), AgentRole::Relay, GridCoord::new(2, 3), true);

        strategy.take_step(&mut agent, &fixture.ctx(1));
        assert!(agent.mission_complete);
        assert!(fixture.coordination.rendezvous.rendezvous(AgentId(1)).unwrap().finished);
        assert_eq!(agent.state(), ExplorationState::ReturnToBase);

        agent.has_base_link = true;
        strategy.take_step(&mut agent, &fixture.ctx(2));
        assert_eq!(agent.state(), ExplorationState::Finished);
    }
}
