//! Scenario configuration loading.

use std::path::Path;

use serde::Deserialize;

use crate::comms::CommModel;
use crate::core::GridCoord;
use crate::error::{Result, SanghaError};
use crate::exploration::{AgentRole, ReturnPolicy, StrategyKind};
use crate::planning::PlannerConfig;
use crate::topology::RelayConfig;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
pub struct SanghaConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub base: BaseConfig,
    #[serde(default)]
    pub robots: Vec<RobotConfig>,
    #[serde(default)]
    pub exploration: ExplorationConfig,
    #[serde(default)]
    pub relays: RelayConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub comms: CommsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Tick loop settings
#[derive(Clone, Debug, Deserialize)]
pub struct SimulationConfig {
    /// Hard stop (default: 3000)
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Seed for every agent's random stream (default: 7)
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Stop once the base knows this percentage of free space (default: 95.0)
    #[serde(default = "default_coverage_goal")]
    pub coverage_goal: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            seed: default_seed(),
            coverage_goal: default_coverage_goal(),
        }
    }
}

/// Ground-truth world
#[derive(Clone, Debug, Deserialize)]
pub struct EnvironmentConfig {
    /// Grid width in cells
    #[serde(default = "default_width")]
    pub width: usize,

    /// Grid height in cells
    #[serde(default = "default_height")]
    pub height: usize,

    /// Grayscale bitmap; dark pixels are walls. Overrides width/height.
    #[serde(default)]
    pub image: Option<String>,

    /// Rectangular walls
    #[serde(default)]
    pub walls: Vec<WallConfig>,

    /// Surround the world with a one-cell wall (default: true)
    #[serde(default = "default_true")]
    pub border: bool,
}

/// Axis-aligned wall rectangle in cells
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct WallConfig {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Base station placement
#[derive(Clone, Debug, Deserialize)]
pub struct BaseConfig {
    #[serde(default = "default_base_location")]
    pub location: GridCoord,

    #[serde(default = "default_comm_range")]
    pub comm_range: f64,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            location: default_base_location(),
            comm_range: default_comm_range(),
        }
    }
}

/// One mobile robot
#[derive(Clone, Debug, Deserialize)]
pub struct RobotConfig {
    #[serde(default)]
    pub role: AgentRole,

    #[serde(default)]
    pub strategy: StrategyKind,

    pub start: GridCoord,

    /// Radio range in cells (default: 25.0)
    #[serde(default = "default_comm_range")]
    pub comm_range: f64,

    /// Sensor range in cells (default: 10.0)
    #[serde(default = "default_sense_range")]
    pub sense_range: f64,

    /// Readings closer than this are confident (default: 5.0)
    #[serde(default = "default_safe_range")]
    pub safe_range: f64,

    /// Cells per tick (default: 1)
    #[serde(default = "default_speed")]
    pub speed: usize,

    /// Relays carried at start (default: 0)
    #[serde(default)]
    pub relays: usize,

    /// Partner robot number for role-based pairs (1-based)
    #[serde(default)]
    pub partner: Option<u32>,

    /// Team for leader/follower chains and hungarian regrouping
    #[serde(default)]
    pub team: Option<u32>,
}

/// Frontier exploration parameters
#[derive(Clone, Debug, Deserialize)]
pub struct ExplorationConfig {
    #[serde(default)]
    pub return_policy: ReturnPolicy,

    /// Random-walk ticks before exploring (default: 3)
    #[serde(default = "default_init_cycles")]
    pub init_cycles: u64,

    /// Ticks between frontier replans (default: 10)
    #[serde(default = "default_replan_interval")]
    pub replan_interval: u64,

    /// Smallest frontier worth visiting, in cells (default: 3.0)
    #[serde(default = "default_min_frontier_area")]
    pub min_frontier_area: f64,

    /// Frontiers handed to the allocator (default: 10)
    #[serde(default = "default_max_frontiers")]
    pub max_frontiers: usize,

    /// Rejection radius around blacklisted frontiers (default: 2.0)
    #[serde(default = "default_blacklist_radius")]
    pub blacklist_radius: f64,

    /// Exponent on distance in frontier utility (default: 2.0)
    #[serde(default = "default_distance_exponent")]
    pub distance_exponent: f64,

    /// Teammate target closer than this to ours forces a random step (default: 2.0)
    #[serde(default = "default_overlap_radius")]
    pub overlap_radius: f64,

    /// Replans without progress before giving up (default: 20)
    #[serde(default = "default_stagnation_limit")]
    pub stagnation_limit: u32,

    /// Percentage of own belief known that completes the mission (default: 99.0)
    #[serde(default = "default_goal_percent")]
    pub goal_percent: f64,

    /// Base period of [`ReturnPolicy::PeriodicReturn`] (default: 150)
    #[serde(default = "default_periodic_return_period")]
    pub periodic_return_period: u64,

    /// Threshold of [`ReturnPolicy::UtilReturn`] (default: 0.6)
    #[serde(default = "default_target_info_ratio")]
    pub target_info_ratio: f64,

    /// Out-of-contact teammates stay in allocation this long (default: 50)
    #[serde(default = "default_remember_teammate_period")]
    pub remember_teammate_period: u64,

    /// First rendezvous deadline of role-based explorers (default: 50)
    #[serde(default = "default_rendezvous_period")]
    pub rendezvous_period: u64,

    /// Ticks before a pair may meet again (default: 10)
    #[serde(default = "default_comm_timeout")]
    pub comm_timeout: u64,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            return_policy: ReturnPolicy::default(),
            init_cycles: default_init_cycles(),
            replan_interval: default_replan_interval(),
            min_frontier_area: default_min_frontier_area(),
            max_frontiers: default_max_frontiers(),
            blacklist_radius: default_blacklist_radius(),
            distance_exponent: default_distance_exponent(),
            overlap_radius: default_overlap_radius(),
            stagnation_limit: default_stagnation_limit(),
            goal_percent: default_goal_percent(),
            periodic_return_period: default_periodic_return_period(),
            target_info_ratio: default_target_info_ratio(),
            remember_teammate_period: default_remember_teammate_period(),
            rendezvous_period: default_rendezvous_period(),
            comm_timeout: default_comm_timeout(),
        }
    }
}

/// Topological map parameters
#[derive(Clone, Debug, Deserialize)]
pub struct TopologyConfig {
    /// Side of a region block in cells (default: 10)
    #[serde(default = "default_region_size")]
    pub region_size: usize,

    /// Newly learned cells before the map is rebuilt (default: 50)
    #[serde(default = "default_map_changed_threshold")]
    pub map_changed_threshold: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            region_size: default_region_size(),
            map_changed_threshold: default_map_changed_threshold(),
        }
    }
}

/// Radio model
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CommsConfig {
    #[serde(default)]
    pub model: CommModel,
}

/// Output configuration
#[derive(Clone, Debug, Deserialize)]
pub struct OutputConfig {
    /// Base station belief snapshot written at the end of the run
    #[serde(default)]
    pub png: Option<String>,

    /// Ticks between progress log lines (default: 100)
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            png: None,
            log_interval: default_log_interval(),
        }
    }
}

// Default value functions
fn default_max_ticks() -> u64 {
    3000
}
fn default_seed() -> u64 {
    7
}
fn default_coverage_goal() -> f64 {
    95.0
}
fn default_width() -> usize {
    80
}
fn default_height() -> usize {
    60
}
fn default_true() -> bool {
    true
}
fn default_base_location() -> GridCoord {
    GridCoord::new(2, 2)
}
fn default_comm_range() -> f64 {
    25.0
}
fn default_sense_range() -> f64 {
    10.0
}
fn default_safe_range() -> f64 {
    5.0
}
fn default_speed() -> usize {
    1
}
fn default_init_cycles() -> u64 {
    3
}
fn default_replan_interval() -> u64 {
    10
}
fn default_min_frontier_area() -> f64 {
    3.0
}
fn default_max_frontiers() -> usize {
    10
}
fn default_blacklist_radius() -> f64 {
    2.0
}
fn default_distance_exponent() -> f64 {
    2.0
}
fn default_overlap_radius() -> f64 {
    2.0
}
fn default_stagnation_limit() -> u32 {
    20
}
fn default_goal_percent() -> f64 {
    99.0
}
fn default_periodic_return_period() -> u64 {
    150
}
fn default_target_info_ratio() -> f64 {
    0.6
}
fn default_remember_teammate_period() -> u64 {
    50
}
fn default_rendezvous_period() -> u64 {
    50
}
fn default_comm_timeout() -> u64 {
    10
}
fn default_region_size() -> usize {
    10
}
fn default_map_changed_threshold() -> usize {
    50
}
fn default_log_interval() -> u64 {
    100
}

impl SanghaConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: SanghaConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SanghaConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.missing_dimensions() {
            return Err(SanghaError::Config(
                "environment needs a non-zero width and height".to_string(),
            ));
        }
        if self.topology.region_size == 0 {
            return Err(SanghaError::Config("topology.region_size must be positive".to_string()));
        }
        for (i, robot) in self.robots.iter().enumerate() {
            if robot.speed == 0 {
                return Err(SanghaError::Config(format!("robot {} has zero speed", i + 1)));
            }
            if let Some(partner) = robot.partner
                && (partner == 0 || partner as usize > self.robots.len() || partner as usize == i + 1)
            {
                return Err(SanghaError::Config(format!(
                    "robot {} has invalid partner {}",
                    i + 1,
                    partner
                )));
            }
        }
        Ok(())
    }

    fn missing_dimensions(&self) -> bool {
        self.environment.image.is_none() && (self.environment.width == 0 || self.environment.height == 0)
    }
}
