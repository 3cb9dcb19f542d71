//! Meetup registry for teams that regroup between assignment rounds.
//!
//! A round starts only once every member waits at the team's meetup point.
//! The member that starts it publishes one order per member: a target to
//! explore and the meetup point of the next round.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::TeamId;
use crate::core::{AgentId, GridCoord};

/// What a member does after the team regrouped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeetupOrder {
    /// Visit `target`, then regroup at `meetup`.
    Explore {
        round: u64,
        target: GridCoord,
        meetup: GridCoord,
    },
    /// Nothing left to assign
    Finished,
}

/// Assignment for a new round. Members without a target get the meetup
/// itself and return straight away.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeetupPlan {
    pub targets: Vec<(AgentId, GridCoord)>,
    pub meetup: GridCoord,
}

#[derive(Debug)]
struct Meetup {
    /// Sorted by agent id
    members: Vec<AgentId>,
    arrived: Vec<bool>,
    orders: Vec<Option<MeetupOrder>>,
    point: GridCoord,
    round: u64,
    finished: bool,
}

impl Meetup {
    fn index_of(&self, agent: AgentId) -> Option<usize> {
        self.members.binary_search(&agent).ok()
    }

    fn all_arrived(&self) -> bool {
        self.arrived.iter().all(|&a| a)
    }
}

/// Meetup registry keyed by team.
#[derive(Debug, Default)]
pub struct MeetupRegistry {
    teams: Mutex<HashMap<TeamId, Meetup>>,
}

impl MeetupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `agent` to `team`. The team's first meetup is `initial`; later
    /// joiners do not move it.
    pub fn join(&self, team: TeamId, agent: AgentId, initial: GridCoord) {
        let mut teams = self.teams.lock();
        let meetup = teams.entry(team).or_insert_with(|| Meetup {
            members: Vec::new(),
            arrived: Vec::new(),
            orders: Vec::new(),
            point: initial,
            round: 0,
            finished: false,
        });
        if let Err(pos) = meetup.members.binary_search(&agent) {
            meetup.members.insert(pos, agent);
            meetup.arrived.insert(pos, false);
            meetup.orders.insert(pos, None);
        }
    }

    pub fn members(&self, team: TeamId) -> Vec<AgentId> {
        self.teams
            .lock()
            .get(&team)
            .map_or_else(Vec::new, |m| m.members.clone())
    }

    pub fn meetup(&self, team: TeamId) -> Option<GridCoord> {
        self.teams.lock().get(&team).map(|m| m.point)
    }

    pub fn round(&self, team: TeamId) -> u64 {
        self.teams.lock().get(&team).map_or(0, |m| m.round)
    }

    pub fn is_finished(&self, team: TeamId) -> bool {
        self.teams.lock().get(&team).is_some_and(|m| m.finished)
    }

    /// `agent` waits at the meetup. Returns whether the whole team does.
    pub fn arrive(&self, team: TeamId, agent: AgentId) -> bool {
        let mut teams = self.teams.lock();
        let Some(meetup) = teams.get_mut(&team) else {
            return false;
        };
        let Some(i) = meetup.index_of(agent) else {
            return false;
        };
        meetup.arrived[i] = true;
        meetup.all_arrived()
    }

    pub fn all_arrived(&self, team: TeamId) -> bool {
        self.teams.lock().get(&team).is_some_and(Meetup::all_arrived)
    }

    /// Start a round once the whole team waits and every order of the last
    /// round was collected. `None` finishes the team. Only the first caller
    /// of a round succeeds.
    pub fn begin_round(&self, team: TeamId, plan: Option<MeetupPlan>) -> bool {
        let mut teams = self.teams.lock();
        let Some(meetup) = teams.get_mut(&team) else {
            return false;
        };
        if meetup.finished || !meetup.all_arrived() || meetup.orders.iter().any(Option::is_some) {
            return false;
        }
        let Some(plan) = plan else {
            meetup.finished = true;
            meetup.orders.fill(Some(MeetupOrder::Finished));
            info!("{} has nothing left to assign", team);
            return true;
        };

        meetup.round += 1;
        meetup.point = plan.meetup;
        let round = meetup.round;
        for (member, order) in meetup.members.iter().zip(meetup.orders.iter_mut()) {
            let target = plan
                .targets
                .iter()
                .find(|(agent, _)| agent == member)
                .map_or(plan.meetup, |&(_, target)| target);
            *order = Some(MeetupOrder::Explore {
                round,
                target,
                meetup: plan.meetup,
            });
        }
        meetup.arrived.fill(false);
        info!(
            "{} round {}: {} targets, regrouping at {}",
            team,
            round,
            plan.targets.len(),
            plan.meetup
        );
        true
    }

    /// Collect `agent`'s order for the current round, once.
    pub fn take_order(&self, team: TeamId, agent: AgentId) -> Option<MeetupOrder> {
        let mut teams = self.teams.lock();
        let meetup = teams.get_mut(&team)?;
        let i = meetup.index_of(agent)?;
        let order = meetup.orders[i].take();
        if order.is_some() {
            debug!("{} collected its {} order", agent, team);
        }
        order
    }
}
