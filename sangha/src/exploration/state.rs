//! Exploration states, roles and return policies.

use std::fmt;

use serde::Deserialize;

/// Per-agent exploration state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ExplorationState {
    #[default]
    Initial,
    Explore,
    ReturnToBase,
    SettingRelay,
    TakingRelay,
    GoToRelay,
    Finished,
}

impl ExplorationState {
    pub fn name(self) -> &'static str {
        match self {
            ExplorationState::Initial => "initial",
            ExplorationState::Explore => "explore",
            ExplorationState::ReturnToBase => "return_to_base",
            ExplorationState::SettingRelay => "setting_relay",
            ExplorationState::TakingRelay => "taking_relay",
            ExplorationState::GoToRelay => "go_to_relay",
            ExplorationState::Finished => "finished",
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        self == ExplorationState::Finished
    }
}

impl fmt::Display for ExplorationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a mobile agent is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    #[default]
    Explorer,
    Relay,
}

/// When a frontier explorer heads back to the base on its own accord.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnPolicy {
    /// Only once nothing is left to explore
    #[default]
    ReturnWhenComplete,
    /// After a no-contact period that stretches with stagnation
    PeriodicReturn,
    /// When the base's share of our knowledge drops below a target ratio
    UtilReturn,
}

impl ReturnPolicy {
    /// Whether the agent should return now.
    ///
    /// `no_return_timer` counts ticks since the last base contact.
    /// `base_belief` is the number of our free cells the base already knows,
    /// `new_info` the number only we hold.
    #[allow(clippy::too_many_arguments)]
    pub fn should_return(
        self,
        no_return_timer: u64,
        period: u64,
        max_stagnation: u32,
        base_belief: usize,
        new_info: usize,
        target_ratio: f64,
    ) -> bool {
        match self {
            ReturnPolicy::ReturnWhenComplete => false,
            ReturnPolicy::PeriodicReturn => {
                no_return_timer > period * (u64::from(max_stagnation) + 10) / 10
            }
            ReturnPolicy::UtilReturn => {
                let total = base_belief + new_info;
                total > 0 && (base_belief as f64 / total as f64) < target_ratio
            }
        }
    }
}
