//! Tick scheduler.
//!
//! Each tick runs five phases in a fixed order:
//!
//! ```text
//!  links ──► merge ──► decide (one scoped thread per mobile agent) ──► apply ──► stop?
//! ```
//!
//! Only the decide phase runs in parallel. Agents own their grids there and
//! reach shared state through the [`CoordinationContext`] alone.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use tracing::{debug, error, info, warn};

use super::{Agent, Environment, sense};
use crate::comms::{CommTable, ConnectivityOracle};
use crate::config::{RobotConfig, SanghaConfig};
use crate::coordination::{CoordinationContext, TeamId};
use crate::core::{AgentId, GridCoord};
use crate::error::{Result, SanghaError};
use crate::exploration::{
    AgentCore, AgentParams, AgentRole, ExplorationStrategy, FrontierStrategy, HungarianStrategy,
    LeaderFollowerStrategy, RoleBasedStrategy, StepAction, StepContext, StepDecision,
    StrategyKind,
};
use crate::frontier::FrontierCellTracer;
use crate::grid::OccupancyGrid;
use crate::planning::GridPlanner;

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    MaxTicks,
    AllFinished,
    CoverageGoal,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopReason::MaxTicks => "tick budget exhausted",
            StopReason::AllFinished => "all agents finished",
            StopReason::CoverageGoal => "coverage goal reached",
        };
        f.write_str(name)
    }
}

/// Outcome of [`Simulation::run`].
#[derive(Clone, Debug)]
pub struct SimulationReport {
    pub ticks: u64,
    pub reason: StopReason,
    /// Percentage of the environment's free cells the base knows
    pub base_coverage: f64,
    pub base_free_cells: usize,
    pub relays_deployed: usize,
    pub relays_collected: usize,
}

/// A complete scenario: ground truth, agents and shared registries.
pub struct Simulation {
    config: SanghaConfig,
    environment: Environment,
    /// Fully known grid of the environment, for links and move validation
    truth: OccupancyGrid,
    total_free: usize,
    agents: Vec<Agent>,
    coordination: CoordinationContext,
    planner: GridPlanner,
    tracer: FrontierCellTracer,
    oracle: Box<dyn ConnectivityOracle>,
    links: CommTable,
    tick: u64,
    next_id: u32,
    relays_deployed: usize,
    relays_collected: usize,
}

impl Simulation {
    pub fn new(config: SanghaConfig) -> Result<Self> {
        let environment = Environment::from_config(&config.environment)?;
        environment.check_placement("base station", config.base.location)?;
        for (i, robot) in config.robots.iter().enumerate() {
            environment.check_placement(&format!("robot {}", i + 1), robot.start)?;
        }
        let truth = environment.to_occupancy_grid();
        let total_free = environment.total_free();
        if total_free == 0 {
            return Err(SanghaError::Scenario("environment has no free space".to_string()));
        }

        let coordination = CoordinationContext::new();
        let empty_grid = OccupancyGrid::new(environment.width(), environment.height())
            .with_change_threshold(config.topology.map_changed_threshold);

        let base_params = AgentParams {
            comm_range: config.base.comm_range,
            ..AgentParams::default()
        };
        let mut base = AgentCore::new(
            AgentId::BASE,
            AgentRole::Relay,
            config.base.location,
            base_params,
            empty_grid.clone(),
            config.simulation.seed,
        );
        sense(
            &environment,
            &mut base.grid,
            base.location,
            base.params.sense_range,
            base.params.safe_range,
        );
        mark_known_at_base(&mut base.grid);

        let mut agents = vec![Agent::stationary(base)];
        for (i, robot) in config.robots.iter().enumerate() {
            let id = AgentId(i as u32 + 1);
            let core = AgentCore::new(
                id,
                robot.role,
                robot.start,
                AgentParams::from(robot),
                empty_grid.clone(),
                config.simulation.seed,
            )
            .with_blacklist_radius(config.exploration.blacklist_radius)
            .with_region_size(config.topology.region_size)
            .with_relays(robot.relays);
            let strategy = build_strategy(&config, robot, &core, &coordination)?;
            info!(
                "{} ({:?}) starts at {} with strategy {}",
                id,
                robot.role,
                robot.start,
                strategy.name()
            );
            agents.push(Agent::mobile(core, strategy));
        }

        let next_id = agents.len() as u32;
        info!(
            "Simulation ready: {}x{} cells ({} free), {} robots",
            environment.width(),
            environment.height(),
            total_free,
            config.robots.len()
        );

        Ok(Self {
            oracle: config.comms.model.oracle(),
            planner: GridPlanner::new(config.planner.clone()),
            config,
            environment,
            truth,
            total_free,
            agents,
            coordination,
            tracer: FrontierCellTracer,
            links: CommTable::default(),
            tick: 0,
            next_id,
            relays_deployed: 0,
            relays_collected: 0,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(SanghaConfig::load(path)?)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id() == id)
    }

    pub fn coordination(&self) -> &CoordinationContext {
        &self.coordination
    }

    pub fn links(&self) -> &CommTable {
        &self.links
    }

    /// The base station's belief.
    pub fn base_grid(&self) -> &OccupancyGrid {
        &self.agents[0].core.grid
    }

    pub fn base_coverage(&self) -> f64 {
        100.0 * self.base_grid().num_free_cells() as f64 / self.total_free as f64
    }

    // ------------------------------------------------------------------
    // Tick loop
    // ------------------------------------------------------------------

    /// Run until a stop condition holds.
    pub fn run(&mut self) -> SimulationReport {
        loop {
            if let Some(reason) = self.stop_reason() {
                let report = self.report(reason);
                info!(
                    "Stopped after {} ticks ({}): base knows {:.1}% of free space",
                    report.ticks, reason, report.base_coverage
                );
                return report;
            }
            self.step();
        }
    }

    /// Advance by one tick.
    pub fn step(&mut self) {
        self.detect_links();
        self.merge_beliefs();
        let decisions = self.decide();
        self.apply(decisions);
        self.tick += 1;

        let interval = self.config.output.log_interval;
        if interval > 0 && self.tick % interval == 0 {
            info!(
                "Tick {}: base coverage {:.1}%, {} agents, {} relays deployed",
                self.tick,
                self.base_coverage(),
                self.agents.len(),
                self.relays_deployed
            );
        }
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.base_coverage() >= self.config.simulation.coverage_goal {
            return Some(StopReason::CoverageGoal);
        }
        let mut mobile = self.agents.iter().filter(|a| a.is_mobile()).peekable();
        if mobile.peek().is_some() && mobile.all(Agent::is_finished) {
            return Some(StopReason::AllFinished);
        }
        if self.tick >= self.config.simulation.max_ticks {
            return Some(StopReason::MaxTicks);
        }
        None
    }

    pub fn report(&self, reason: StopReason) -> SimulationReport {
        SimulationReport {
            ticks: self.tick,
            reason,
            base_coverage: self.base_coverage(),
            base_free_cells: self.base_grid().num_free_cells(),
            relays_deployed: self.relays_deployed,
            relays_collected: self.relays_collected,
        }
    }

    /// Write the base station's belief as a PNG.
    pub fn save_base_map<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.base_grid().save_to_png(path)
    }

    fn detect_links(&mut self) {
        let nodes: Vec<_> = self.agents.iter().map(Agent::node).collect();
        self.links = CommTable::detect(&nodes, &self.truth, self.oracle.as_ref());
    }

    /// Merge every directly linked partner's belief, then refresh the
    /// teammate tables. Partners are read from snapshots taken before the
    /// phase, so the merge order does not matter.
    fn merge_beliefs(&mut self) {
        let snapshots: Vec<OccupancyGrid> = self.agents.iter().map(|a| a.core.grid.clone()).collect();
        let ids: Vec<AgentId> = self.agents.iter().map(Agent::id).collect();
        let links = &self.links;

        for agent in self.agents.iter_mut() {
            let id = agent.id();
            let with_base = links.connected(id, AgentId::BASE);
            for partner in links.direct_partners(id) {
                let Some(index) = ids.iter().position(|&other| other == partner) else {
                    continue;
                };
                let changed = agent.core.grid.merge(&snapshots[index], with_base);
                if id.is_base() {
                    for &c in &changed {
                        agent.core.grid.set_known_at_base(c);
                    }
                }
                agent.core.mark_dirty(changed);
            }
            agent.core.has_base_link = !id.is_base() && with_base;
        }

        let infos: Vec<_> = self
            .agents
            .iter()
            .map(|a| {
                (
                    a.id(),
                    a.teammate_info(self.tick, false, links.connected(a.id(), AgentId::BASE)),
                )
            })
            .collect();
        let present: HashSet<AgentId> = ids.iter().copied().collect();
        for agent in self.agents.iter_mut() {
            let id = agent.id();
            agent.core.teammates.retain(|other, _| present.contains(other));
            for (other, info) in &infos {
                if *other == id {
                    continue;
                }
                if links.connected(id, *other) {
                    let mut info = *info;
                    info.has_link = links.direct(id, *other);
                    agent.core.teammates.insert(*other, info);
                } else if let Some(known) = agent.core.teammates.get_mut(other) {
                    known.has_link = false;
                }
            }
        }
    }

    /// Sense and step every mobile agent on its own scoped thread.
    fn decide(&mut self) -> Vec<(usize, StepDecision)> {
        let ctx = StepContext {
            tick: self.tick,
            config: &self.config.exploration,
            relay_config: &self.config.relays,
            base: self.config.base.location,
            base_range: self.config.base.comm_range,
            total_free: self.total_free,
            coordination: &self.coordination,
            planner: &self.planner,
            tracer: &self.tracer,
            oracle: self.oracle.as_ref(),
        };
        let environment = &self.environment;

        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .agents
                .iter_mut()
                .enumerate()
                .filter_map(|(index, agent)| {
                    let strategy = agent.strategy.as_mut()?;
                    let core = &mut agent.core;
                    let handle = scope.spawn(move || {
                        sense(
                            environment,
                            &mut core.grid,
                            core.location,
                            core.params.sense_range,
                            core.params.safe_range,
                        );
                        strategy.take_step(core, &ctx)
                    });
                    Some((index, handle))
                })
                .collect();

            handles
                .into_iter()
                .map(|(index, handle)| {
                    let decision = handle.join().unwrap_or_else(|_| {
                        error!("Step thread of agent slot {} panicked; agent stays", index);
                        StepDecision::stay()
                    });
                    (index, decision)
                })
                .collect()
        })
    }

    fn apply(&mut self, decisions: Vec<(usize, StepDecision)>) {
        let mut dropped = Vec::new();
        let mut collected = Vec::new();

        for (index, decision) in decisions {
            let core = &mut self.agents[index].core;
            let mut at = core.location;
            for &next in &decision.route {
                if !self.truth.legal_move(at, next) {
                    debug!("{}: illegal move {} -> {}", core.id, at, next);
                    core.env_error = true;
                    break;
                }
                at = next;
            }
            core.location = at;

            match decision.action {
                Some(StepAction::DropRelay) => {
                    if core.relays_carried == 0 {
                        warn!("{} asked to drop a relay but carries none", core.id);
                    } else {
                        core.relays_carried -= 1;
                        dropped.push((core.location, core.params.comm_range, core.grid.clone()));
                    }
                }
                Some(StepAction::PickUpRelay(relay)) => collected.push((index, relay)),
                None => {}
            }
        }

        for (index, relay) in collected {
            self.pick_up(index, relay);
        }
        for (location, comm_range, grid) in dropped {
            self.deploy_relay(location, comm_range, grid);
        }
    }

    fn deploy_relay(&mut self, location: GridCoord, comm_range: f64, grid: OccupancyGrid) {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        let params = AgentParams {
            comm_range,
            ..AgentParams::default()
        };
        let core = AgentCore::new(
            id,
            AgentRole::Relay,
            location,
            params,
            grid,
            self.config.simulation.seed,
        );
        info!("Relay {} deployed at {} (tick {})", id, location, self.tick);
        self.agents.push(Agent::stationary(core));
        self.relays_deployed += 1;
    }

    fn pick_up(&mut self, picker: usize, relay: AgentId) {
        let picker_location = self.agents[picker].core.location;
        let Some(slot) = self
            .agents
            .iter()
            .position(|a| a.id() == relay && a.is_relay())
        else {
            debug!("Relay {} is gone", relay);
            return;
        };
        if self.agents[slot].core.location.chebyshev_distance(&picker_location) > 1 {
            debug!("Relay {} is out of reach of {}", relay, self.agents[picker].id());
            return;
        }
        let removed = self.agents.remove(slot);
        // Removing an earlier slot shifts the picker down by one.
        let picker = if slot < picker { picker - 1 } else { picker };
        let core = &mut self.agents[picker].core;
        core.relays_carried += 1;
        core.teammates.remove(&removed.id());
        info!("{} picked up relay {} at {}", core.id, removed.id(), removed.core.location);
        self.relays_collected += 1;
    }
}

/// Everything the base's grid holds is known at the base.
fn mark_known_at_base(grid: &mut OccupancyGrid) {
    let known: Vec<GridCoord> = grid.coords().filter(|&c| grid.free_space_at(c)).collect();
    for c in known {
        grid.set_known_at_base(c);
    }
}

fn build_strategy(
    config: &SanghaConfig,
    robot: &RobotConfig,
    core: &AgentCore,
    coordination: &CoordinationContext,
) -> Result<Box<dyn ExplorationStrategy>> {
    let strategy: Box<dyn ExplorationStrategy> = match robot.strategy {
        StrategyKind::Frontier => Box::new(FrontierStrategy::new()),
        StrategyKind::RoleBased => {
            let partner = robot.partner.ok_or_else(|| {
                SanghaError::Config(format!("{} uses role_based without a partner", core.id))
            })?;
            Box::new(RoleBasedStrategy::new(
                core,
                AgentId(partner),
                &coordination.rendezvous,
                config.base.location,
                config.exploration.rendezvous_period,
            ))
        }
        StrategyKind::LeaderFollower => Box::new(LeaderFollowerStrategy::new(
            core,
            TeamId(robot.team.unwrap_or(0)),
            &coordination.chains,
        )),
        StrategyKind::Hungarian => Box::new(HungarianStrategy::new(
            core,
            TeamId(robot.team.unwrap_or(0)),
            &coordination.meetups,
            config.base.location,
        )),
    };
    Ok(strategy)
}
