//! Scheduler-side agent wrapper.

use crate::comms::CommNode;
use crate::core::AgentId;
use crate::exploration::{AgentCore, ExplorationState, ExplorationStrategy, TeammateInfo};

/// One agent as seen by the simulation: shared state plus the strategy that
/// drives it. The base station and dropped relays have no strategy and never
/// move.
pub struct Agent {
    pub core: AgentCore,
    pub strategy: Option<Box<dyn ExplorationStrategy>>,
}

impl Agent {
    pub fn mobile(core: AgentCore, strategy: Box<dyn ExplorationStrategy>) -> Self {
        Self {
            core,
            strategy: Some(strategy),
        }
    }

    pub fn stationary(core: AgentCore) -> Self {
        Self { core, strategy: None }
    }

    #[inline]
    pub fn id(&self) -> AgentId {
        self.core.id
    }

    #[inline]
    pub fn is_mobile(&self) -> bool {
        self.strategy.is_some()
    }

    /// Deployed relay: stationary and not the base.
    pub fn is_relay(&self) -> bool {
        !self.is_mobile() && !self.id().is_base()
    }

    pub fn is_finished(&self) -> bool {
        self.core.state() == ExplorationState::Finished
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.as_ref().map_or("stationary", |s| s.name())
    }

    pub fn node(&self) -> CommNode {
        CommNode {
            id: self.core.id,
            location: self.core.location,
            range: self.core.params.comm_range,
        }
    }

    /// What a connected teammate learns about us this tick.
    pub fn teammate_info(&self, tick: u64, has_link: bool, has_base_link: bool) -> TeammateInfo {
        TeammateInfo {
            id: self.core.id,
            role: self.core.role,
            location: self.core.location,
            comm_range: self.core.params.comm_range,
            stationary: !self.is_mobile(),
            has_link,
            has_base_link,
            last_contact: tick,
            target: self.core.target(),
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.core.id)
            .field("location", &self.core.location)
            .field("state", &self.core.state())
            .field("strategy", &self.strategy_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GridCoord;
    use crate::exploration::{AgentParams, AgentRole, FrontierStrategy};
    use crate::grid::OccupancyGrid;

    fn core(id: u32) -> AgentCore {
        AgentCore::new(
            AgentId(id),
            AgentRole::Explorer,
            GridCoord::new(3, 4),
            AgentParams::default(),
            OccupancyGrid::new(10, 10),
            1,
        )
    }

    #[test]
    fn test_kinds() {
        let base = Agent::stationary(core(0));
        let relay = Agent::stationary(core(4));
        let robot = Agent::mobile(core(1), Box::new(FrontierStrategy::new()));

        assert!(!base.is_mobile() && !base.is_relay());
        assert!(relay.is_relay());
        assert!(robot.is_mobile() && !robot.is_relay());
        assert_eq!(robot.strategy_name(), "frontier");
        assert_eq!(relay.strategy_name(), "stationary");
    }

    #[test]
    fn test_teammate_info_reflects_agent() {
        let relay = Agent::stationary(core(4));
        let info = relay.teammate_info(12, true, false);
        assert_eq!(info.id, AgentId(4));
        assert_eq!(info.location, GridCoord::new(3, 4));
        assert_eq!(info.last_contact, 12);
        assert!(info.stationary && info.has_link && !info.has_base_link);
        assert!(info.is_relay());
        assert_eq!(info.target, None);
    }
}
