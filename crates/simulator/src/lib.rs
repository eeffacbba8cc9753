//! Config-driven launcher for generalized Paxos simulations.

pub mod config;

pub use config::{ConfigError, SimConfig};
