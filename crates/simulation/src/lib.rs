//! Deterministic simulation of a generalized Paxos topology.
//!
//! The simulator is single-threaded and drives a virtual clock: every
//! suspension point of the real system (message latency, timers, schedule
//! firings) becomes an entry in one totally-ordered event queue. Given the
//! same [`TopologySpec`] (which includes the seed), a run produces
//! identical results every time.
//!
//! The runner doubles as the monitor handle from the role states' point of
//! view: it exposes atomic snapshots of all role states, the accumulated
//! violation log, and delay injection.

mod event_queue;
mod monitor;
mod network;
mod runner;

pub use event_queue::EventKey;
pub use monitor::{
    all_proposed_decided, learned_non_contradictory, learned_were_proposed, learners_agree,
    single_acceptance_among_conflicting, AllStates, MonitorBreach,
};
pub use network::{AddressFilter, DelayKind, DelayProfile, DelayRule, SimulatedNetwork};
pub use runner::{SimulationRunner, SimulationStats, TopologyError, TopologySpec};

/// Index type for simulation-only node routing.
pub type NodeIndex = u32;
