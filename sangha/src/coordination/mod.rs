//! Shared coordination state.
//!
//! The only mutable state shared between agents. The simulation owns one
//! [`CoordinationContext`] and hands a reference to every strategy step; each
//! registry sits behind its own mutex so steps on different worker threads
//! can call in at any time.

mod chain;
mod meetup;
mod rendezvous;

pub use chain::{ChainRegistry, ChainState, ChainTarget, TeamId};
pub use meetup::{MeetupOrder, MeetupPlan, MeetupRegistry};
pub use rendezvous::{Rendezvous, RendezvousRegistry};

/// Registries shared by all agents of one run.
#[derive(Debug, Default)]
pub struct CoordinationContext {
    pub rendezvous: RendezvousRegistry,
    pub chains: ChainRegistry,
    pub meetups: MeetupRegistry,
}

impl CoordinationContext {
    pub fn new() -> Self {
        Self::default()
    }
}
