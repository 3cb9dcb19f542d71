//! Leader/follower chain registry.
//!
//! Members sorted by id form a chain hanging off the base station: index 0
//! talks to the base, index `i` to `i - 1`, and the last member leads.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::core::{AgentId, GridCoord};
use crate::frontier::FrontierId;

/// Stable identifier of a chain team.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TeamId(pub u32);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainState {
    GoingHome,
    WaitAtBase,
    GoingToFrontier,
    WaitInChain,
    /// No frontiers left
    Done,
}

/// Target of the current chain round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainTarget {
    pub round: u64,
    pub frontier: FrontierId,
    pub goal: GridCoord,
}

#[derive(Debug)]
struct Chain {
    /// Sorted by agent id
    members: Vec<AgentId>,
    states: Vec<ChainState>,
    target: Option<ChainTarget>,
    round: u64,
}

impl Chain {
    fn index_of(&self, agent: AgentId) -> Option<usize> {
        self.members.binary_search(&agent).ok()
    }

    fn all_in(&self, state: ChainState) -> bool {
        self.states.iter().all(|&s| s == state)
    }
}

/// Chain registry keyed by team.
#[derive(Debug, Default)]
pub struct ChainRegistry {
    teams: Mutex<HashMap<TeamId, Chain>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `agent` to `team`; indices are reassigned by id. New members start
    /// in [`ChainState::GoingHome`].
    pub fn join(&self, team: TeamId, agent: AgentId) {
        let mut teams = self.teams.lock();
        let chain = teams.entry(team).or_insert_with(|| Chain {
            members: Vec::new(),
            states: Vec::new(),
            target: None,
            round: 0,
        });
        if let Err(pos) = chain.members.binary_search(&agent) {
            chain.members.insert(pos, agent);
            chain.states.insert(pos, ChainState::GoingHome);
        }
    }

    pub fn index_of(&self, team: TeamId, agent: AgentId) -> Option<usize> {
        self.teams.lock().get(&team)?.index_of(agent)
    }

    pub fn len(&self, team: TeamId) -> usize {
        self.teams.lock().get(&team).map_or(0, |c| c.members.len())
    }

    pub fn leader(&self, team: TeamId) -> Option<AgentId> {
        self.teams.lock().get(&team)?.members.last().copied()
    }

    /// Chain neighbours of `agent`. `None` predecessor means the base.
    pub fn neighbours(&self, team: TeamId, agent: AgentId) -> Option<(Option<AgentId>, Option<AgentId>)> {
        let teams = self.teams.lock();
        let chain = teams.get(&team)?;
        let i = chain.index_of(agent)?;
        let predecessor = i.checked_sub(1).map(|p| chain.members[p]);
        let successor = chain.members.get(i + 1).copied();
        Some((predecessor, successor))
    }

    pub fn state(&self, team: TeamId, agent: AgentId) -> Option<ChainState> {
        let teams = self.teams.lock();
        let chain = teams.get(&team)?;
        chain.index_of(agent).map(|i| chain.states[i])
    }

    pub fn set_state(&self, team: TeamId, agent: AgentId, state: ChainState) -> bool {
        let mut teams = self.teams.lock();
        let Some(chain) = teams.get_mut(&team) else {
            return false;
        };
        match chain.index_of(agent) {
            Some(i) => {
                chain.states[i] = state;
                true
            }
            None => false,
        }
    }

    pub fn all_in_state(&self, team: TeamId, state: ChainState) -> bool {
        self.teams.lock().get(&team).is_some_and(|c| c.all_in(state))
    }

    /// Start a new round once the whole team waits at base. With a target
    /// every member heads out; without one the team is done. Only the first
    /// caller of a round succeeds.
    pub fn begin_round(&self, team: TeamId, target: Option<(FrontierId, GridCoord)>) -> bool {
        let mut teams = self.teams.lock();
        let Some(chain) = teams.get_mut(&team) else {
            return false;
        };
        if !chain.all_in(ChainState::WaitAtBase) {
            return false;
        }
        match target {
            Some((frontier, goal)) => {
                chain.round += 1;
                chain.target = Some(ChainTarget {
                    round: chain.round,
                    frontier,
                    goal,
                });
                chain.states.fill(ChainState::GoingToFrontier);
                info!("{} round {}: heading for {}", team, chain.round, goal);
            }
            None => {
                chain.target = None;
                chain.states.fill(ChainState::Done);
                info!("{} has no frontiers left", team);
            }
        }
        true
    }

    pub fn target(&self, team: TeamId) -> Option<ChainTarget> {
        self.teams.lock().get(&team)?.target
    }

    /// `agent` moved forward: it and everyone behind it in the chain may
    /// advance again.
    pub fn trigger_successors(&self, team: TeamId, agent: AgentId) {
        let mut teams = self.teams.lock();
        let Some(chain) = teams.get_mut(&team) else { return };
        if let Some(i) = chain.index_of(agent) {
            for state in &mut chain.states[i..] {
                if *state == ChainState::WaitInChain {
                    *state = ChainState::GoingToFrontier;
                }
            }
        }
    }

    /// Send the whole team home once every member is stuck. Returns whether
    /// this call did so.
    pub fn go_home_if_stalled(&self, team: TeamId) -> bool {
        let mut teams = self.teams.lock();
        let Some(chain) = teams.get_mut(&team) else {
            return false;
        };
        if !chain.all_in(ChainState::WaitInChain) {
            return false;
        }
        chain.states.fill(ChainState::GoingHome);
        debug!("{} stalled in round {}, going home", team, chain.round);
        true
    }
}
