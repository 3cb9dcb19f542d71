//! Relay placement policies.

use std::collections::HashSet;

use rand::Rng;
use rand::rngs::StdRng;
use serde::Deserialize;
use tracing::debug;

use super::graph::TopologicalMap;
use super::node::NodeId;
use crate::comms::ConnectivityOracle;
use crate::core::{AgentId, GridCoord};
use crate::grid::OccupancyGrid;

/// Where mobile agents put down the relays they carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayPolicy {
    #[default]
    None,
    Random,
    KeyPoints,
    RangeBorder,
}

/// Relay policy configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub policy: RelayPolicy,
    /// Per-tick drop probability for [`RelayPolicy::Random`]
    #[serde(default = "default_drop_chance")]
    pub drop_chance: f64,
    /// Per-tick pick-up probability for [`RelayPolicy::Random`]
    #[serde(default = "default_take_chance")]
    pub take_chance: f64,
    /// Minimum distance between two relays (cells)
    #[serde(default = "default_relay_spacing")]
    pub relay_spacing: f64,
    /// Fraction of the comm range kept as safety margin by
    /// [`RelayPolicy::RangeBorder`]
    #[serde(default = "default_range_margin")]
    pub range_margin: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            policy: RelayPolicy::default(),
            drop_chance: default_drop_chance(),
            take_chance: default_take_chance(),
            relay_spacing: default_relay_spacing(),
            range_margin: default_range_margin(),
        }
    }
}

fn default_drop_chance() -> f64 {
    0.05
}
fn default_take_chance() -> f64 {
    0.05
}
fn default_relay_spacing() -> f64 {
    8.0
}
fn default_range_margin() -> f64 {
    0.2
}

/// A deployed relay as known to the deciding agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelaySite {
    pub id: AgentId,
    pub location: GridCoord,
    pub has_base_link: bool,
}

/// Outcome of relay processing for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RelayDecision {
    /// Put a relay down where the agent stands
    Drop,
    /// Pick up an adjacent relay
    Take(AgentId),
    /// Travel to `target` first; pick up `relay` there, or drop if `None`
    GoTo {
        target: GridCoord,
        relay: Option<AgentId>,
    },
}

/// Agent-side inputs to relay processing.
#[derive(Clone, Copy, Debug)]
pub struct RelayRequest<'a> {
    pub location: GridCoord,
    pub base: GridCoord,
    pub comm_range: f64,
    pub carrying: usize,
    pub relays: &'a [RelaySite],
}

impl RelayRequest<'_> {
    /// Base plus every relay linked to it.
    fn chain(&self) -> Vec<GridCoord> {
        std::iter::once(self.base)
            .chain(self.relays.iter().filter(|r| r.has_base_link).map(|r| r.location))
            .collect()
    }

    fn relay_near(&self, c: GridCoord, spacing: f64) -> bool {
        self.relays.iter().any(|r| r.location.distance(&c) < spacing)
    }
}

/// Deployed relays that no longer help: cut off from the base, or standing
/// in a dead-end region. Nearest to `from` first.
pub fn needless_relays<'a>(
    map: &TopologicalMap,
    relays: &'a [RelaySite],
    from: GridCoord,
) -> Vec<&'a RelaySite> {
    let mut needless: Vec<_> = relays
        .iter()
        .filter(|r| !r.has_base_link || map.is_dead_end_at(r.location))
        .collect();
    needless.sort_by(|a, b| {
        from.distance(&a.location)
            .total_cmp(&from.distance(&b.location))
            .then_with(|| a.id.cmp(&b.id))
    });
    needless
}

/// Applies a [`RelayPolicy`] over one agent's belief.
pub struct RelayPlanner<'a> {
    config: &'a RelayConfig,
    grid: &'a OccupancyGrid,
    oracle: &'a dyn ConnectivityOracle,
}

impl<'a> RelayPlanner<'a> {
    pub fn new(
        config: &'a RelayConfig,
        grid: &'a OccupancyGrid,
        oracle: &'a dyn ConnectivityOracle,
    ) -> Self {
        Self {
            config,
            grid,
            oracle,
        }
    }

    pub fn decide(
        &self,
        map: &mut TopologicalMap,
        request: &RelayRequest<'_>,
        rng: &mut StdRng,
    ) -> Option<RelayDecision> {
        if self.config.policy == RelayPolicy::None {
            return None;
        }

        if let Some(relay) = needless_relays(map, request.relays, request.location).first() {
            debug!("Recalling {} at {}", relay.id, relay.location);
            return Some(if relay.location.chebyshev_distance(&request.location) <= 1 {
                RelayDecision::Take(relay.id)
            } else {
                RelayDecision::GoTo {
                    target: relay.location,
                    relay: Some(relay.id),
                }
            });
        }

        // Nothing gets placed from inside a dead end
        if map.topological_area(request.location).is_none() || map.is_dead_end_at(request.location) {
            return None;
        }

        match self.config.policy {
            RelayPolicy::None => None,
            RelayPolicy::Random => self.random(request, rng),
            RelayPolicy::KeyPoints => self.key_points(map, request),
            RelayPolicy::RangeBorder => self.range_border(request),
        }
    }

    fn random(&self, request: &RelayRequest<'_>, rng: &mut StdRng) -> Option<RelayDecision> {
        let at_relay = request.relays.iter().any(|r| r.location == request.location);
        if request.carrying > 0 && !at_relay && rng.random_bool(self.config.drop_chance.clamp(0.0, 1.0)) {
            return Some(RelayDecision::Drop);
        }
        let adjacent = request
            .relays
            .iter()
            .find(|r| r.location.chebyshev_distance(&request.location) <= 1)?;
        rng.random_bool(self.config.take_chance.clamp(0.0, 1.0))
            .then_some(RelayDecision::Take(adjacent.id))
    }

    fn key_points(&self, map: &mut TopologicalMap, request: &RelayRequest<'_>) -> Option<RelayDecision> {
        if request.carrying == 0 {
            return None;
        }
        let chain = request.chain();

        // Junctions first, each group nearest to base first
        let junctions = map.junction_points();
        let mut candidates: Vec<(bool, GridCoord)> = junctions.iter().map(|&p| (false, p)).collect();
        for p in map.key_points() {
            if !junctions.contains(&p) {
                candidates.push((true, p));
            }
        }
        candidates.retain(|&(_, p)| chain.iter().any(|&a| self.grid.direct_line_possible(p, a, false)));
        candidates.sort_by(|(ka, a), (kb, b)| {
            ka.cmp(kb)
                .then_with(|| request.base.distance(a).total_cmp(&request.base.distance(b)))
                .then_with(|| a.cmp(b))
        });

        let border: HashSet<NodeId> = request
            .relays
            .iter()
            .filter_map(|r| map.topological_area(r.location))
            .collect();

        for (_, p) in candidates {
            let spacing = self.config.relay_spacing;
            if request.relay_near(p, spacing) || request.base.distance(&p) < spacing {
                continue;
            }
            let Some(node) = map.topological_area(p) else { continue };
            if map.calculate_dead_end(node, &border) {
                continue;
            }
            if !chain
                .iter()
                .any(|&a| self.oracle.is_connected(self.grid, request.comm_range, p, a))
            {
                continue;
            }
            return Some(if p == request.location {
                RelayDecision::Drop
            } else {
                RelayDecision::GoTo {
                    target: p,
                    relay: None,
                }
            });
        }
        None
    }

    fn range_border(&self, request: &RelayRequest<'_>) -> Option<RelayDecision> {
        if request.carrying == 0 || request.relay_near(request.location, self.config.relay_spacing) {
            return None;
        }
        let nearest = request.chain().into_iter().min_by(|a, b| {
            request
                .location
                .distance(a)
                .total_cmp(&request.location.distance(b))
        })?;
        let range = request.comm_range;
        let inner = range * (1.0 - self.config.range_margin);
        let at_border = self.oracle.is_connected(self.grid, range, request.location, nearest)
            && !self.oracle.is_connected(self.grid, inner, request.location, nearest);
        at_border.then_some(RelayDecision::Drop)
    }
}
