//! Per-agent knowledge and bookkeeping shared by all strategies.

use std::collections::{BTreeMap, HashSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace};

use super::state::{AgentRole, ExplorationState};
use super::StepContext;
use crate::allocation::{Candidate, FrontierAllocator, frontiers_of_interest};
use crate::config::RobotConfig;
use crate::core::{AgentId, GridCoord};
use crate::frontier::{Frontier, FrontierBlacklist, FrontierId, extract_frontiers};
use crate::grid::OccupancyGrid;
use crate::planning::Path;
use crate::topology::{RelayDecision, RelayPlanner, RelayPolicy, RelayRequest, RelaySite, TopologicalMap};

/// Physical parameters of a robot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentParams {
    pub comm_range: f64,
    pub sense_range: f64,
    pub safe_range: f64,
    /// Cells per tick
    pub speed: usize,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            comm_range: 25.0,
            sense_range: 10.0,
            safe_range: 5.0,
            speed: 1,
        }
    }
}

impl From<&RobotConfig> for AgentParams {
    fn from(robot: &RobotConfig) -> Self {
        Self {
            comm_range: robot.comm_range,
            sense_range: robot.sense_range,
            safe_range: robot.safe_range,
            speed: robot.speed.max(1),
        }
    }
}

/// What an agent last heard about a teammate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TeammateInfo {
    pub id: AgentId,
    pub role: AgentRole,
    pub location: GridCoord,
    pub comm_range: f64,
    /// Base station or deployed relay
    pub stationary: bool,
    /// Directly linked this tick
    pub has_link: bool,
    pub has_base_link: bool,
    /// Tick of the last direct contact
    pub last_contact: u64,
    /// Goal of the teammate's current path
    pub target: Option<GridCoord>,
}

impl TeammateInfo {
    /// A mobile explorer heard from within the last `period` ticks.
    pub fn is_allocation_peer(&self, tick: u64, period: u64) -> bool {
        !self.stationary
            && self.role == AgentRole::Explorer
            && tick.saturating_sub(self.last_contact) <= period
    }

    /// A deployed relay (not the base).
    #[inline]
    pub fn is_relay(&self) -> bool {
        self.stationary && !self.id.is_base()
    }
}

/// Progress counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExplorationStats {
    pub time_since_last_plan: u64,
    /// Ticks since the last base link
    pub no_return_timer: u64,
    /// Consecutive replans without new knowledge
    pub stagnation: u32,
    pub max_stagnation: u32,
    pub last_percentage: f64,
}

/// Outcome of [`AgentCore::choose_frontier`].
#[derive(Clone, Debug)]
pub enum FrontierChoice {
    Chosen { frontier: Frontier, path: Path },
    /// Frontiers remain, but every reachable one went to a teammate
    ClaimedByTeam,
    /// No reachable frontier at all
    Exhausted,
}

/// State every strategy works on: the agent's belief, position and
/// exploration bookkeeping.
#[derive(Debug)]
pub struct AgentCore {
    pub id: AgentId,
    pub role: AgentRole,
    pub location: GridCoord,
    pub params: AgentParams,
    pub grid: OccupancyGrid,
    pub path: Option<Path>,
    pub teammates: BTreeMap<AgentId, TeammateInfo>,
    pub blacklist: FrontierBlacklist,
    pub topology: TopologicalMap,
    /// Frontier currently targeted
    pub frontier: Option<Frontier>,
    pub rng: StdRng,
    pub mission_complete: bool,
    /// Last route was refused by the environment
    pub env_error: bool,
    pub has_base_link: bool,
    pub relays_carried: usize,
    /// Relay to pick up once [`ExplorationState::GoToRelay`] arrives
    pub relay_target: Option<AgentId>,
    pub stats: ExplorationStats,
    frontiers: Vec<Frontier>,
    state: ExplorationState,
    prev_state: ExplorationState,
    state_timer: u64,
    dirty: Vec<GridCoord>,
}

impl AgentCore {
    pub fn new(
        id: AgentId,
        role: AgentRole,
        location: GridCoord,
        params: AgentParams,
        grid: OccupancyGrid,
        seed: u64,
    ) -> Self {
        let topology = TopologicalMap::new(grid.width(), grid.height(), 10);
        Self {
            id,
            role,
            location,
            params,
            grid,
            path: None,
            teammates: BTreeMap::new(),
            blacklist: FrontierBlacklist::new(2.0),
            topology,
            frontier: None,
            rng: StdRng::seed_from_u64(seed.wrapping_add(u64::from(id.0))),
            mission_complete: false,
            env_error: false,
            has_base_link: false,
            relays_carried: 0,
            relay_target: None,
            stats: ExplorationStats::default(),
            frontiers: Vec::new(),
            state: ExplorationState::Initial,
            prev_state: ExplorationState::Initial,
            state_timer: 0,
            dirty: Vec::new(),
        }
    }

    pub fn with_blacklist_radius(mut self, radius: f64) -> Self {
        self.blacklist = FrontierBlacklist::new(radius);
        self
    }

    pub fn with_region_size(mut self, region_size: usize) -> Self {
        self.topology = TopologicalMap::new(self.grid.width(), self.grid.height(), region_size);
        self
    }

    pub fn with_relays(mut self, relays: usize) -> Self {
        self.relays_carried = relays;
        self
    }

    // ------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------

    #[inline]
    pub fn state(&self) -> ExplorationState {
        self.state
    }

    #[inline]
    pub fn previous_state(&self) -> ExplorationState {
        self.prev_state
    }

    /// Ticks spent in the current state, counting the running one.
    #[inline]
    pub fn state_timer(&self) -> u64 {
        self.state_timer
    }

    /// Switch state. Re-entering the current state is a no-op.
    pub fn set_state(&mut self, state: ExplorationState) {
        if state == self.state {
            return;
        }
        debug!("{}: {} -> {}", self.id, self.state, state);
        self.prev_state = self.state;
        self.state = state;
        self.state_timer = 0;
    }

    pub fn restore_previous_state(&mut self) {
        self.set_state(self.prev_state);
    }

    /// Bookkeeping at the start of a step.
    pub fn begin_step(&mut self) {
        self.state_timer += 1;
    }

    /// Bookkeeping at the end of a step.
    pub fn end_step(&mut self) {
        self.stats.time_since_last_plan += 1;
        if self.has_base_link {
            self.stats.no_return_timer = 0;
        } else {
            self.stats.no_return_timer += 1;
        }
        self.stats.max_stagnation = self.stats.max_stagnation.max(self.stats.stagnation);
    }

    // ------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------

    pub fn has_valid_path(&self) -> bool {
        self.path.as_ref().is_some_and(Path::is_valid)
    }

    pub fn invalidate_path(&mut self) {
        if let Some(path) = self.path.as_mut() {
            path.invalidate();
        }
    }

    /// Goal of the current path.
    pub fn target(&self) -> Option<GridCoord> {
        self.path.as_ref().filter(|p| p.is_valid()).and_then(Path::goal)
    }

    /// Take up to `speed` cells off the current path.
    ///
    /// Stops early at a step our own belief already rules out, and
    /// invalidates the path then.
    pub fn follow_path(&mut self) -> Vec<GridCoord> {
        let mut route = Vec::with_capacity(self.params.speed);
        let Some(path) = self.path.as_mut().filter(|p| p.is_valid()) else {
            return route;
        };
        let mut from = self.location;
        while route.len() < self.params.speed {
            let Some(next) = path.next_point() else { break };
            if next == from {
                continue;
            }
            if !self.grid.legal_move(from, next) {
                trace!("{}: path step {} -> {} blocked on own map", self.id, from, next);
                path.invalidate();
                break;
            }
            route.push(next);
            from = next;
        }
        route
    }

    /// Plan from the current location and store the path. Returns whether a
    /// valid path was found.
    pub fn plan_to(&mut self, ctx: &StepContext<'_>, goal: GridCoord, exact: bool) -> bool {
        let path = ctx.planner.plan(&self.grid, self.location, goal, exact);
        let valid = path.is_valid();
        self.path = Some(path);
        valid
    }

    // ------------------------------------------------------------------
    // Knowledge
    // ------------------------------------------------------------------

    /// Share of the environment's free space known to this agent.
    pub fn percentage_known(&self, total_free: usize) -> f64 {
        if total_free == 0 {
            return 100.0;
        }
        100.0 * self.grid.num_free_cells() as f64 / total_free as f64
    }

    /// Count a replan without new knowledge as stagnation.
    pub fn update_stagnation(&mut self, total_free: usize) {
        let percentage = self.percentage_known(total_free);
        if (percentage - self.stats.last_percentage).abs() < f64::EPSILON {
            self.stats.stagnation += 1;
        } else {
            self.stats.stagnation = 0;
        }
        self.stats.last_percentage = percentage;
    }

    /// Current frontiers, largest first.
    pub fn frontiers(&self) -> &[Frontier] {
        &self.frontiers
    }

    /// Re-extract frontiers from the belief grid.
    ///
    /// Outlines of the previous set are queued as dirty cells.
    pub fn calculate_frontiers(&mut self, ctx: &StepContext<'_>) -> usize {
        for frontier in &self.frontiers {
            self.dirty.extend_from_slice(frontier.outline());
        }
        let contours = ctx.tracer.find_all_contours(&self.grid);
        self.frontiers = extract_frontiers(contours, ctx.config.min_frontier_area, &self.blacklist);
        trace!("{}: {} frontiers", self.id, self.frontiers.len());
        self.frontiers.len()
    }

    /// Rebuild the topological map if the grid changed enough, then refresh
    /// its frontier and dead-end annotations.
    pub fn refresh_topology(&mut self, ctx: &StepContext<'_>) -> bool {
        if !self.topology.update(&mut self.grid, ctx.planner) {
            return false;
        }
        self.topology.assign_frontiers(&self.frontiers);
        if let Some(root) = self.topology.topological_area(ctx.base) {
            let dead_ends = self.topology.calculate_dead_ends(root);
            debug!(
                "{}: topology rebuilt ({} nodes, {} dead ends)",
                self.id,
                self.topology.nodes().len(),
                dead_ends
            );
        }
        true
    }

    /// Pick a frontier, first together with recently heard explorers,
    /// then alone over whatever the team matching left unclaimed.
    ///
    /// Unreachable frontiers are blacklisted along the way.
    pub fn choose_frontier(&mut self, ctx: &StepContext<'_>) -> FrontierChoice {
        let interest = frontiers_of_interest(
            &self.frontiers,
            self.frontier.as_ref(),
            &self.grid,
            ctx.planner,
            self.location,
            ctx.config.max_frontiers,
            &mut self.blacklist,
        );
        if interest.is_empty() {
            return FrontierChoice::Exhausted;
        }

        let own = Candidate {
            agent: self.id,
            location: self.location,
        };
        let mut candidates = vec![own];
        candidates.extend(
            self.teammates
                .values()
                .filter(|t| t.is_allocation_peer(ctx.tick, ctx.config.remember_teammate_period))
                .map(|t| Candidate {
                    agent: t.id,
                    location: t.location,
                }),
        );

        let allocator = FrontierAllocator::new(&self.grid, ctx.planner, ctx.config.distance_exponent);
        let mut allocation = allocator.allocate(self.id, &candidates, &interest);
        for id in &allocation.unreachable {
            self.blacklist.insert(*id);
        }

        let mut claimed = false;
        if allocation.own.is_none() && candidates.len() > 1 {
            let taken: HashSet<FrontierId> = allocation
                .assignments
                .iter()
                .filter(|a| a.agent != self.id)
                .map(|a| a.frontier.id())
                .collect();
            let unclaimed: Vec<Frontier> = interest
                .iter()
                .filter(|f| !taken.contains(&f.id()) && !self.blacklist.contains(&f.id()))
                .cloned()
                .collect();
            claimed = !taken.is_empty();
            if !unclaimed.is_empty() {
                debug!(
                    "{}: nothing left by the team, allocating alone over {} frontiers",
                    self.id,
                    unclaimed.len()
                );
                allocation = allocator.allocate(self.id, &[own], &unclaimed);
                for id in &allocation.unreachable {
                    self.blacklist.insert(*id);
                }
            }
        }

        let chosen = allocation
            .own
            .and_then(|u| u.path.filter(Path::is_valid).map(|path| (u.frontier, path)));
        match chosen {
            Some((frontier, path)) => FrontierChoice::Chosen { frontier, path },
            None if claimed => FrontierChoice::ClaimedByTeam,
            None => FrontierChoice::Exhausted,
        }
    }

    /// Deployed relays known from the teammate table.
    pub fn relay_sites(&self) -> Vec<RelaySite> {
        self.teammates
            .values()
            .filter(|t| t.is_relay())
            .map(|t| RelaySite {
                id: t.id,
                location: t.location,
                has_base_link: t.has_base_link,
            })
            .collect()
    }

    /// Run the configured relay policy from where we stand.
    pub fn decide_relay(&mut self, ctx: &StepContext<'_>) -> Option<RelayDecision> {
        if ctx.relay_config.policy == RelayPolicy::None {
            return None;
        }
        let relays = self.relay_sites();
        let request = RelayRequest {
            location: self.location,
            base: ctx.base,
            comm_range: self.params.comm_range,
            carrying: self.relays_carried,
            relays: &relays,
        };
        RelayPlanner::new(ctx.relay_config, &self.grid, ctx.oracle).decide(
            &mut self.topology,
            &request,
            &mut self.rng,
        )
    }

    /// Queue cells for redraw.
    pub fn mark_dirty(&mut self, cells: impl IntoIterator<Item = GridCoord>) {
        self.dirty.extend(cells);
    }

    /// Cells changed since the last drain.
    pub fn drain_dirty_cells(&mut self) -> Vec<GridCoord> {
        std::mem::take(&mut self.dirty)
    }
}
