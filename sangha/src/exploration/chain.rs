//! Leader/follower chains that stretch out from the base without breaking
//! connectivity.

use tracing::debug;

use super::state::ExplorationState;
use super::{AgentCore, ExplorationStrategy, StepContext, StepDecision};
use crate::coordination::{ChainRegistry, ChainState, TeamId};
use crate::core::{AgentId, GridCoord};
use crate::frontier::FrontierId;
use crate::planning::Path;

/// One member of a chain team.
///
/// Members gather at the base. Once everyone waits there, the first member
/// to notice publishes the largest frontier as the round's target and all
/// set out along their paths to it. Each member steps forward only while
/// the next cell keeps it linked to its predecessor (the base for the first
/// member) and to its successor; otherwise it waits in the chain. When every
/// member waits, the team goes home for the next round.
#[derive(Clone, Debug)]
pub struct LeaderFollowerStrategy {
    team: TeamId,
    /// Round whose target our path leads to
    round: u64,
    /// Target of the last round we took part in
    last_target: Option<FrontierId>,
}

impl LeaderFollowerStrategy {
    /// Join `team` in the registry.
    pub fn new(agent: &AgentCore, team: TeamId, registry: &ChainRegistry) -> Self {
        registry.join(team, agent.id);
        Self {
            team,
            round: 0,
            last_target: None,
        }
    }

    fn go_home(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        if let Some(target) = self.last_target.take() {
            agent.blacklist.insert(target);
        }
        let registry = &ctx.coordination.chains;
        if agent.location == ctx.base {
            agent.path = None;
            registry.set_state(self.team, agent.id, ChainState::WaitAtBase);
            return StepDecision::stay();
        }
        if agent.env_error || agent.target() != Some(ctx.base) {
            agent.env_error = false;
            agent.plan_to(ctx, ctx.base, false);
        }
        StepDecision::route(agent.follow_path())
    }

    fn wait_at_base(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        let registry = &ctx.coordination.chains;
        if registry.all_in_state(self.team, ChainState::WaitAtBase) {
            agent.calculate_frontiers(ctx);
            let target = agent.frontiers().first().map(|f| (f.id(), f.centre()));
            if registry.begin_round(self.team, target) {
                debug!("{}: started a round for {}", agent.id, self.team);
            }
        }
        StepDecision::stay()
    }

    fn advance(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        let registry = &ctx.coordination.chains;
        let Some(target) = registry.target(self.team) else {
            return StepDecision::stay();
        };
        if target.round != self.round || agent.env_error {
            agent.env_error = false;
            self.round = target.round;
            self.last_target = Some(target.frontier);
            agent.plan_to(ctx, target.goal, false);
        }

        let next = agent
            .path
            .as_ref()
            .filter(|p| p.is_valid())
            .and_then(|p| p.remaining().first().copied());
        match next {
            Some(next) if self.position_okay(agent, ctx, next) => {
                registry.trigger_successors(self.team, agent.id);
                let step = agent.path.as_mut().and_then(Path::next_point);
                StepDecision::route(step.into_iter().collect())
            }
            _ => {
                registry.set_state(self.team, agent.id, ChainState::WaitInChain);
                StepDecision::stay()
            }
        }
    }

    /// Whether standing at `p` keeps us linked with both chain neighbours.
    fn position_okay(&self, agent: &AgentCore, ctx: &StepContext<'_>, p: GridCoord) -> bool {
        let Some((predecessor, successor)) = ctx.coordination.chains.neighbours(self.team, agent.id)
        else {
            return false;
        };
        let linked = |id: AgentId, own_range: bool| {
            agent.teammates.get(&id).is_some_and(|t| {
                let range = if own_range { agent.params.comm_range } else { t.comm_range };
                ctx.oracle.is_connected(&agent.grid, range, p, t.location)
            })
        };
        let behind = match predecessor {
            None => ctx.oracle.is_connected(&agent.grid, ctx.base_range, p, ctx.base),
            Some(id) => linked(id, false),
        };
        behind && successor.is_none_or(|id| linked(id, true))
    }
}

impl ExplorationStrategy for LeaderFollowerStrategy {
    fn name(&self) -> &'static str {
        "leader_follower"
    }

    fn take_step(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        agent.begin_step();
        let registry = &ctx.coordination.chains;
        let chain_state = if ctx.tick == 0 {
            None
        } else {
            registry.state(self.team, agent.id)
        };

        let decision = match chain_state {
            None => StepDecision::stay(),
            Some(ChainState::GoingHome) => {
                agent.set_state(ExplorationState::ReturnToBase);
                self.go_home(agent, ctx)
            }
            Some(ChainState::WaitAtBase) => {
                agent.set_state(ExplorationState::ReturnToBase);
                self.wait_at_base(agent, ctx)
            }
            Some(ChainState::GoingToFrontier) => {
                agent.set_state(ExplorationState::Explore);
                self.advance(agent, ctx)
            }
            Some(ChainState::WaitInChain) => {
                agent.set_state(ExplorationState::Explore);
                registry.go_home_if_stalled(self.team);
                StepDecision::stay()
            }
            Some(ChainState::Done) => {
                agent.mission_complete = true;
                agent.set_state(ExplorationState::Finished);
                StepDecision::stay()
            }
        };
        agent.end_step();
        decision
    }
}
