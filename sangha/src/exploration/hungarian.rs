//! Teams that regroup at a meetup point and split the largest frontiers by
//! minimum-cost assignment.

use tracing::{debug, info};

use super::state::ExplorationState;
use super::walk::random_step;
use super::{AgentCore, ExplorationStrategy, StepContext, StepDecision};
use crate::allocation::{frontiers_of_interest, hungarian, optimistic_utility};
use crate::coordination::{MeetupOrder, MeetupPlan, MeetupRegistry, TeamId};
use crate::core::{AgentId, GridCoord};

/// Best-placed topological nodes tried as the next meetup
const MEETUP_CANDIDATES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Explore,
    Return,
    Wait,
    GoHome,
    Done,
}

impl Phase {
    fn exploration_state(self) -> ExplorationState {
        match self {
            Phase::Explore => ExplorationState::Explore,
            Phase::Return | Phase::Wait | Phase::GoHome => ExplorationState::ReturnToBase,
            Phase::Done => ExplorationState::Finished,
        }
    }
}

/// One member of a regrouping team.
///
/// Members walk to the team's meetup point (the base at first) and wait.
/// Once all of them wait, the first to notice takes the largest frontiers
/// of its belief, one per member, matches them to members by minimum-cost
/// assignment over frontier utility, and picks the next meetup among the
/// topological nodes. Everyone then visits its target, or goes straight to
/// the next meetup without one, and waits again. With nothing left to
/// assign the team heads for the base.
#[derive(Clone, Debug)]
pub struct HungarianStrategy {
    team: TeamId,
    phase: Phase,
    meetup: GridCoord,
    target: Option<GridCoord>,
}

impl HungarianStrategy {
    /// Join `team` in the registry; the first meetup is `base`.
    pub fn new(agent: &AgentCore, team: TeamId, registry: &MeetupRegistry, base: GridCoord) -> Self {
        registry.join(team, agent.id, base);
        Self {
            team,
            phase: Phase::Return,
            meetup: registry.meetup(team).unwrap_or(base),
            target: None,
        }
    }

    fn explore(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        let Some(target) = self.target.filter(|&t| t != self.meetup) else {
            debug!("{}: no target this round", agent.id);
            return self.head_back(agent, ctx);
        };
        if agent.location == target {
            debug!("{}: reached {}", agent.id, target);
            return self.head_back(agent, ctx);
        }
        if agent.env_error {
            agent.env_error = false;
            debug!("{}: blocked on the way to {}", agent.id, target);
            return self.head_back(agent, ctx);
        }
        if agent.target() != Some(target) && !agent.plan_to(ctx, target, true) {
            debug!("{}: no path to {}", agent.id, target);
            return self.head_back(agent, ctx);
        }
        let route = agent.follow_path();
        if route.is_empty() {
            return self.head_back(agent, ctx);
        }
        StepDecision::route(route)
    }

    fn head_back(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        self.phase = Phase::Return;
        self.target = None;
        agent.path = None;
        self.go_to_meetup(agent, ctx)
    }

    fn go_to_meetup(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        if agent.location == self.meetup {
            agent.path = None;
            self.phase = Phase::Wait;
            ctx.coordination.meetups.arrive(self.team, agent.id);
            return StepDecision::stay();
        }
        if agent.env_error || agent.target() != Some(self.meetup) {
            agent.env_error = false;
            agent.plan_to(ctx, self.meetup, true);
        }
        let route = agent.follow_path();
        if route.is_empty() {
            return StepDecision::route(random_step(agent));
        }
        StepDecision::route(route)
    }

    fn wait(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        let registry = &ctx.coordination.meetups;
        let mut order = registry.take_order(self.team, agent.id);
        if order.is_none() && registry.all_arrived(self.team) {
            let plan = self.plan_round(agent, ctx);
            if registry.begin_round(self.team, plan) {
                debug!("{}: started a round for {}", agent.id, self.team);
            }
            order = registry.take_order(self.team, agent.id);
        }

        match order {
            Some(MeetupOrder::Explore { round, target, meetup }) => {
                debug!("{}: round {} heads for {}, then {}", agent.id, round, target, meetup);
                self.target = Some(target);
                self.meetup = meetup;
                self.phase = Phase::Explore;
            }
            Some(MeetupOrder::Finished) => {
                agent.mission_complete = true;
                self.phase = Phase::GoHome;
            }
            None => {}
        }
        StepDecision::stay()
    }

    /// Assignment for the next round from this agent's belief, `None` once
    /// nothing is worth assigning.
    fn plan_round(&self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> Option<MeetupPlan> {
        agent.update_stagnation(ctx.total_free);
        agent.calculate_frontiers(ctx);
        let members = ctx.coordination.meetups.members(self.team);
        let extracted = agent.frontiers().to_vec();
        let frontiers = frontiers_of_interest(
            &extracted,
            None,
            &agent.grid,
            ctx.planner,
            agent.location,
            members.len(),
            &mut agent.blacklist,
        );

        let percentage = agent.percentage_known(ctx.total_free);
        if frontiers.is_empty()
            || percentage >= ctx.config.goal_percent
            || agent.stats.stagnation > ctx.config.stagnation_limit
        {
            info!(
                "{}: nothing left for {} ({:.1}% known, {} frontiers)",
                agent.id,
                self.team,
                percentage,
                frontiers.len()
            );
            return None;
        }

        let cost: Vec<Vec<f64>> = members
            .iter()
            .map(|&id| {
                let from = self.member_location(agent, id);
                frontiers
                    .iter()
                    .map(|f| -optimistic_utility(from, f, ctx.config.distance_exponent))
                    .collect()
            })
            .collect();
        let targets: Vec<(AgentId, GridCoord)> = hungarian(&cost)
            .into_iter()
            .zip(&members)
            .filter_map(|(column, &id)| column.map(|j| (id, frontiers[j].centre())))
            .collect();

        let centres: Vec<GridCoord> = targets.iter().map(|&(_, c)| c).collect();
        let meetup = self.next_meetup(agent, ctx, &centres);
        Some(MeetupPlan { targets, meetup })
    }

    fn member_location(&self, agent: &AgentCore, id: AgentId) -> GridCoord {
        if id == agent.id {
            return agent.location;
        }
        agent.teammates.get(&id).map_or(self.meetup, |t| t.location)
    }

    /// Reachable topological node with the smallest worst-case distance to
    /// the round's targets. Keeps the current meetup if there is none.
    fn next_meetup(&self, agent: &mut AgentCore, ctx: &StepContext<'_>, targets: &[GridCoord]) -> GridCoord {
        if targets.is_empty() {
            return self.meetup;
        }
        agent.refresh_topology(ctx);
        let mut candidates: Vec<(f64, GridCoord)> = agent
            .topology
            .key_points()
            .into_iter()
            .filter(|&p| agent.grid.free_space_at(p))
            .map(|p| {
                let worst = targets.iter().map(|t| p.distance(t)).fold(0.0, f64::max);
                (worst, p)
            })
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        candidates
            .into_iter()
            .take(MEETUP_CANDIDATES)
            .map(|(_, p)| p)
            .find(|&p| p == agent.location || ctx.planner.plan(&agent.grid, agent.location, p, false).found())
            .unwrap_or(self.meetup)
    }

    fn go_home(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        if agent.has_base_link || agent.location == ctx.base {
            agent.path = None;
            self.phase = Phase::Done;
            return StepDecision::stay();
        }
        if agent.env_error || agent.target() != Some(ctx.base) {
            agent.env_error = false;
            agent.plan_to(ctx, ctx.base, false);
        }
        let route = agent.follow_path();
        if route.is_empty() {
            return StepDecision::route(random_step(agent));
        }
        StepDecision::route(route)
    }
}

impl ExplorationStrategy for HungarianStrategy {
    fn name(&self) -> &'static str {
        "hungarian"
    }

    fn take_step(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision {
        agent.begin_step();
        let decision = match self.phase {
            Phase::Explore => self.explore(agent, ctx),
            Phase::Return => self.go_to_meetup(agent, ctx),
            Phase::Wait => self.wait(agent, ctx),
            Phase::GoHome => self.go_home(agent, ctx),
            Phase::Done => StepDecision::stay(),
        };
        agent.set_state(self.phase.exploration_state());
        agent.end_step();
        decision
    }
}
