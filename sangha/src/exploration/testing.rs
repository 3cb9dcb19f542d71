//! Step fixtures for strategy tests.

use super::{AgentCore, AgentParams, AgentRole, StepContext};
use crate::comms::LineOfSightOracle;
use crate::config::ExplorationConfig;
use crate::coordination::CoordinationContext;
use crate::core::{AgentId, GridCoord};
use crate::frontier::FrontierCellTracer;
use crate::grid::OccupancyGrid;
use crate::planning::GridPlanner;
use crate::topology::RelayConfig;

pub(crate) struct Fixture {
    pub config: ExplorationConfig,
    pub relay_config: RelayConfig,
    pub coordination: CoordinationContext,
    pub planner: GridPlanner,
    pub tracer: FrontierCellTracer,
    pub oracle: LineOfSightOracle,
    pub base: GridCoord,
    pub base_range: f64,
    pub total_free: usize,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            config: ExplorationConfig::default(),
            relay_config: RelayConfig::default(),
            coordination: CoordinationContext::new(),
            planner: GridPlanner::default(),
            tracer: FrontierCellTracer,
            oracle: LineOfSightOracle,
            base: GridCoord::new(0, 0),
            base_range: 10.0,
            total_free: 100,
        }
    }
}

impl Fixture {
    pub fn ctx(&self, tick: u64) -> StepContext<'_> {
        StepContext {
            tick,
            config: &self.config,
            relay_config: &self.relay_config,
            base: self.base,
            base_range: self.base_range,
            total_free: self.total_free,
            coordination: &self.coordination,
            planner: &self.planner,
            tracer: &self.tracer,
            oracle: &self.oracle,
        }
    }
}

/// Grid with every cell free.
pub(crate) fn open_grid(width: usize, height: usize) -> OccupancyGrid {
    let mut grid = OccupancyGrid::new(width, height);
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            grid.set_free_space_at(GridCoord::new(x, y));
        }
    }
    grid
}

/// Grid free for `x < free_width`, unknown beyond.
pub(crate) fn half_known_grid(width: usize, height: usize, free_width: i32) -> OccupancyGrid {
    let mut grid = OccupancyGrid::new(width, height);
    for y in 0..height as i32 {
        for x in 0..free_width {
            grid.set_free_space_at(GridCoord::new(x, y));
        }
    }
    grid
}

pub(crate) fn explorer(id: AgentId, location: GridCoord, grid: OccupancyGrid) -> AgentCore {
    AgentCore::new(id, AgentRole::Explorer, location, AgentParams::default(), grid, 11)
}
