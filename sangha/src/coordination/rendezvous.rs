//! Explorer/relay rendezvous registry.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::{AgentId, GridCoord};

/// Current meeting agreement of one explorer/relay pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rendezvous {
    pub point: GridCoord,
    /// Bumped every time the explorer publishes a new point
    pub round: u64,
    /// Relay has confirmed this round
    pub acknowledged: bool,
    /// Explorer has nothing left to explore
    pub finished: bool,
}

#[derive(Clone, Debug)]
struct PairState {
    relay: AgentId,
    rendezvous: Rendezvous,
}

/// Pair registry keyed by explorer id.
#[derive(Debug, Default)]
pub struct RendezvousRegistry {
    pairs: Mutex<HashMap<AgentId, PairState>>,
}

impl RendezvousRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pair meeting first at `initial`. Re-registering resets the
    /// agreement.
    pub fn register_pair(&self, explorer: AgentId, relay: AgentId, initial: GridCoord) {
        self.pairs.lock().insert(
            explorer,
            PairState {
                relay,
                rendezvous: Rendezvous {
                    point: initial,
                    round: 0,
                    acknowledged: false,
                    finished: false,
                },
            },
        );
    }

    /// Publish a new meeting point. Returns the new round, or `None` for an
    /// unknown pair.
    pub fn set_rendezvous(&self, explorer: AgentId, point: GridCoord) -> Option<u64> {
        let mut pairs = self.pairs.lock();
        let state = pairs.get_mut(&explorer)?;
        state.rendezvous.point = point;
        state.rendezvous.round += 1;
        state.rendezvous.acknowledged = false;
        debug!("{} set rendezvous {} (round {})", explorer, point, state.rendezvous.round);
        Some(state.rendezvous.round)
    }

    pub fn rendezvous(&self, explorer: AgentId) -> Option<Rendezvous> {
        self.pairs.lock().get(&explorer).map(|s| s.rendezvous)
    }

    /// Relay confirms `round`. Stale rounds are refused.
    pub fn acknowledge(&self, explorer: AgentId, round: u64) -> bool {
        let mut pairs = self.pairs.lock();
        match pairs.get_mut(&explorer) {
            Some(state) if state.rendezvous.round == round => {
                state.rendezvous.acknowledged = true;
                true
            }
            _ => false,
        }
    }

    /// Whether a newer round than `seen_round` was published.
    pub fn is_changed(&self, explorer: AgentId, seen_round: u64) -> bool {
        self.pairs
            .lock()
            .get(&explorer)
            .is_some_and(|s| s.rendezvous.round != seen_round)
    }

    pub fn set_finished(&self, explorer: AgentId) {
        if let Some(state) = self.pairs.lock().get_mut(&explorer) {
            state.rendezvous.finished = true;
        }
    }

    pub fn relay_of(&self, explorer: AgentId) -> Option<AgentId> {
        self.pairs.lock().get(&explorer).map(|s| s.relay)
    }

    pub fn explorer_of(&self, relay: AgentId) -> Option<AgentId> {
        self.pairs
            .lock()
            .iter()
            .find(|(_, s)| s.relay == relay)
            .map(|(&explorer, _)| explorer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_round_trip() {
        let registry = RendezvousRegistry::new();
        let (explorer, relay) = (AgentId(1), AgentId(2));
        registry.register_pair(explorer, relay, GridCoord::new(0, 0));
        assert_eq!(registry.relay_of(explorer), Some(relay));
        assert_eq!(registry.explorer_of(relay), Some(explorer));

        let round = registry.set_rendezvous(explorer, GridCoord::new(5, 5)).unwrap();
        assert!(registry.is_changed(explorer, 0));
        assert!(!registry.is_changed(explorer, round));
        assert!(!registry.acknowledge(explorer, round - 1));
        assert!(registry.acknowledge(explorer, round));

        let current = registry.rendezvous(explorer).unwrap();
        assert_eq!(current.point, GridCoord::new(5, 5));
        assert!(current.acknowledged);
        assert!(!current.finished);
    }

    #[test]
    fn test_unknown_pair() {
        let registry = RendezvousRegistry::new();
        assert_eq!(registry.set_rendezvous(AgentId(9), GridCoord::new(1, 1)), None);
        assert!(registry.rendezvous(AgentId(9)).is_none());
        assert!(!registry.acknowledge(AgentId(9), 0));
        assert!(!registry.is_changed(AgentId(9), 0));
    }

    #[test]
    fn test_concurrent_publishers() {
        let registry = Arc::new(RendezvousRegistry::new());
        for e in 0..8 {
            registry.register_pair(AgentId(e), AgentId(100 + e), GridCoord::new(0, 0));
        }

        let handles: Vec<_> = (0..16)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..250 {
                        let explorer = AgentId((t + i) % 8);
                        if t % 2 == 0 {
                            registry.set_rendezvous(explorer, GridCoord::new(i as i32, t as i32));
                        } else if let Some(r) = registry.rendezvous(explorer) {
                            registry.acknowledge(explorer, r.round);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // 8 publishing threads x 250 calls, spread evenly over 8 pairs
        let total: u64 = (0..8).map(|e| registry.rendezvous(AgentId(e)).unwrap().round).sum();
        assert_eq!(total, 8 * 250);
    }
}
