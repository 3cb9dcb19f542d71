//! Exploration strategies.
//!
//! Every mobile agent runs one [`ExplorationStrategy`] per tick over its own
//! [`AgentCore`]. The strategy only reads shared data through
//! [`StepContext`]; it answers with the cells it wants to traverse and an
//! optional relay action, both validated later by the simulation.
//!
//! | Strategy                    | Coordination              |
//! |-----------------------------|---------------------------|
//! | [`FrontierStrategy`]        | allocation + relay policy |
//! | [`RoleBasedStrategy`]       | rendezvous registry       |
//! | [`LeaderFollowerStrategy`]  | chain registry            |
//! | [`HungarianStrategy`]       | meetup registry           |

mod agent;
mod chain;
mod frontier;
mod hungarian;
mod role;
mod state;
#[cfg(test)]
pub(crate) mod testing;
mod walk;

pub use agent::{AgentCore, AgentParams, ExplorationStats, FrontierChoice, TeammateInfo};
pub use chain::LeaderFollowerStrategy;
pub use frontier::FrontierStrategy;
pub use hungarian::HungarianStrategy;
pub use role::RoleBasedStrategy;
pub use state::{AgentRole, ExplorationState, ReturnPolicy};
pub use walk::random_step;

use serde::Deserialize;

use crate::comms::ConnectivityOracle;
use crate::config::ExplorationConfig;
use crate::coordination::CoordinationContext;
use crate::core::{AgentId, GridCoord};
use crate::frontier::ContourTracer;
use crate::planning::PathPlanner;
use crate::topology::RelayConfig;

/// Strategy selection in configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Frontier,
    RoleBased,
    LeaderFollower,
    Hungarian,
}

/// Read-only inputs shared by every step of one tick.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub tick: u64,
    pub config: &'a ExplorationConfig,
    pub relay_config: &'a RelayConfig,
    pub base: GridCoord,
    pub base_range: f64,
    /// Free cells of the environment, for percentage-known
    pub total_free: usize,
    pub coordination: &'a CoordinationContext,
    pub planner: &'a dyn PathPlanner,
    pub tracer: &'a dyn ContourTracer,
    pub oracle: &'a dyn ConnectivityOracle,
}

/// Relay handling requested by a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepAction {
    DropRelay,
    PickUpRelay(AgentId),
}

/// Result of one strategy step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepDecision {
    /// Cells to traverse this tick, in order. Empty means stay.
    pub route: Vec<GridCoord>,
    pub action: Option<StepAction>,
}

impl StepDecision {
    pub fn stay() -> Self {
        Self::default()
    }

    pub fn route(route: Vec<GridCoord>) -> Self {
        Self {
            route,
            action: None,
        }
    }

    pub fn action(action: StepAction) -> Self {
        Self {
            route: Vec::new(),
            action: Some(action),
        }
    }

    /// Final cell of the route, if the agent moves at all.
    pub fn destination(&self) -> Option<GridCoord> {
        self.route.last().copied()
    }
}

/// One exploration algorithm.
///
/// Implementations keep their algorithm-specific state; everything shared by
/// all strategies lives in [`AgentCore`].
pub trait ExplorationStrategy: Send {
    fn name(&self) -> &'static str;

    fn take_step(&mut self, agent: &mut AgentCore, ctx: &StepContext<'_>) -> StepDecision;
}
