//! Per-mission frontier blacklist.

use std::collections::BTreeSet;

use super::{Frontier, FrontierId};

/// Frontiers an agent gave up on. Entries are never removed.
///
/// Outlines shift a little between rounds, so a frontier whose centre lies
/// within `radius` cells of a blacklisted centre is rejected as well.
#[derive(Clone, Debug, Default)]
pub struct FrontierBlacklist {
    ids: BTreeSet<FrontierId>,
    radius: f64,
}

impl FrontierBlacklist {
    pub fn new(radius: f64) -> Self {
        Self {
            ids: BTreeSet::new(),
            radius,
        }
    }

    /// Returns false if the id was already present.
    pub fn insert(&mut self, id: FrontierId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &FrontierId) -> bool {
        self.ids.contains(id)
    }

    pub fn rejects(&self, frontier: &Frontier) -> bool {
        let centre = frontier.centre();
        self.contains(&frontier.id())
            || (self.radius > 0.0
                && self
                    .ids
                    .iter()
                    .any(|id| id.0.distance(&centre) <= self.radius))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
