//! Random walk used when there is nothing better to do.

use rand::Rng;

use super::AgentCore;
use crate::core::{BresenhamLine, GridCoord};

const RANDOM_STEP_ATTEMPTS: usize = 16;

/// Route to a random nearby cell our own belief allows us to reach in a
/// straight line. Empty if no attempt succeeds.
pub fn random_step(agent: &mut AgentCore) -> Vec<GridCoord> {
    let reach = agent.params.speed.max(1) as i32;
    for _ in 0..RANDOM_STEP_ATTEMPTS {
        let dx = agent.rng.random_range(-reach..=reach);
        let dy = agent.rng.random_range(-reach..=reach);
        if dx == 0 && dy == 0 {
            continue;
        }
        let target = GridCoord::new(agent.location.x + dx, agent.location.y + dy);
        if agent.grid.legal_move(agent.location, target) {
            return BresenhamLine::new(agent.location, target).skip(1).collect();
        }
    }
    Vec::new()
}
