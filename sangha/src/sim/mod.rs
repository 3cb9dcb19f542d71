//! Discrete-tick multi-agent simulation.
//!
//! [`Simulation`] owns the ground truth, every agent and the shared
//! coordination registries, and drives them one tick at a time.

mod agent;
mod environment;
mod sensing;
mod simulation;

pub use agent::Agent;
pub use environment::Environment;
pub use sensing::sense;
pub use simulation::{Simulation, SimulationReport, StopReason};
