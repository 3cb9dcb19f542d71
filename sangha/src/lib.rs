//! # Sangha
//!
//! Decentralized multi-robot exploration on occupancy grids.
//!
//! ## Overview
//!
//! A team of robots explores an unknown 2D world and delivers its map to a
//! base station. Robots only talk while in radio range, so every robot keeps
//! its own belief and beliefs converge through pairwise merges:
//!
//! - **Beliefs**: one [`OccupancyGrid`] per agent with per-cell delivery
//!   bookkeeping (known at base, handed to a relay, owned)
//! - **Frontiers**: boundary regions between known free space and the unknown
//! - **Allocation**: every robot runs the same greedy assignment over what it
//!   knows about its teammates and keeps only its own share
//! - **Relays**: a topological graph of the known map decides where carried
//!   relays are dropped or picked up
//! - **Strategies**: frontier exploration, explorer/relay pairs meeting at
//!   rendezvous points, leader/follower chains, and teams that regroup to
//!   split frontiers by optimal assignment
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      sim/                           │  ← Tick scheduler
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │          exploration/  +  coordination/             │  ← Strategies
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │   frontier/  allocation/  topology/  comms/         │  ← Algorithms
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │           grid/  planning/  core/                   │  ← Foundation
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sangha::{SanghaConfig, Simulation};
//!
//! let config = SanghaConfig::load("configs/office.toml")?;
//! let mut sim = Simulation::new(config)?;
//! let report = sim.run();
//! println!("{} ticks, base knows {:.1}%", report.ticks, report.base_coverage);
//! ```

pub mod allocation;
pub mod comms;
pub mod config;
pub mod coordination;
pub mod core;
pub mod error;
pub mod exploration;
pub mod frontier;
pub mod grid;
pub mod planning;
pub mod sim;
pub mod topology;

pub use config::SanghaConfig;
pub use crate::core::{AgentId, BresenhamLine, GridCoord};
pub use error::{Result, SanghaError};
pub use grid::{CellFlags, OccupancyGrid};

pub use allocation::{Allocation, Candidate, FrontierAllocator};
pub use comms::{CommModel, CommTable, ConnectivityOracle};
pub use coordination::CoordinationContext;
pub use exploration::{AgentCore, ExplorationState, ExplorationStrategy, StrategyKind};
pub use frontier::{ContourTracer, Frontier, FrontierCellTracer};
pub use planning::{GridPlanner, Path, PathPlanner};
pub use sim::{Simulation, SimulationReport, StopReason};
pub use topology::TopologicalMap;
