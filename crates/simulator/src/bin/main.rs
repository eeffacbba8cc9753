//! Generalized Paxos simulator CLI.
//!
//! Reads a YAML topology config, runs it under the deterministic
//! simulator, and reports per-learner learning rates.
//!
//! # Example
//!
//! ```bash
//! # Run a config for its configured lifetime
//! gpaxos-sim --config sim.yaml
//!
//! # Replay with a different seed
//! gpaxos-sim --config sim.yaml --seed 7
//! ```
//!
//! Exits 0 on a clean run and 1 when any protocol violation or invariant
//! breach was observed.

use clap::Parser;
use gpaxos_simulation::SimulationRunner;
use gpaxos_simulator::SimConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Generalized Paxos deterministic simulator.
///
/// Given the same config and seed, produces identical results every run.
#[derive(Parser, Debug)]
#[command(name = "gpaxos-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML topology config.
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Override the config's random seed.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,gpaxos_simulator=info")),
        )
        .init();

    let args = Args::parse();

    let source = match std::fs::read_to_string(&args.config) {
        Ok(source) => source,
        Err(err) => {
            error!(path = %args.config.display(), %err, "cannot read config");
            return ExitCode::from(2);
        }
    };

    let config = match SimConfig::from_yaml(&source) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid config");
            return ExitCode::from(2);
        }
    };

    let mut topology = match config.to_topology() {
        Ok(topology) => topology,
        Err(err) => {
            error!(%err, "invalid config");
            return ExitCode::from(2);
        }
    };
    if let Some(seed) = args.seed {
        topology.seed = seed;
    }

    info!(
        variant = %topology.variant,
        acceptors = topology.members.acceptors,
        learners = topology.members.learners,
        lifetime = ?topology.lifetime,
        seed = topology.seed,
        "starting simulation"
    );

    let mut runner = match SimulationRunner::new(topology) {
        Ok(runner) => runner,
        Err(err) => {
            error!(%err, "cannot launch topology");
            return ExitCode::from(2);
        }
    };
    runner.await_termination();

    let stats = runner.stats();
    let lifetime_secs = runner.spec().lifetime.as_secs_f64();
    println!("\n=== Simulation Complete ===");
    println!("Events:     {}", stats.events_processed);
    println!("Messages:   {} sent, {} dropped", stats.messages_sent, stats.messages_dropped);
    println!("Delivery:   {:.1}%", stats.delivery_rate() * 100.0);
    println!("Proposed:   {}", runner.proposed().len());

    let states = runner.snapshot();
    println!("\n=== Learning ===");
    for learner in &states.learners {
        let learned = learner.learned();
        let accepted = learned.accepted().count();
        println!(
            "learner#{}: {} decided ({} accepted), {:.2} decisions/s",
            learner.index(),
            learned.len(),
            accepted,
            learned.len() as f64 / lifetime_secs,
        );
    }

    let violations = runner.violations();
    let breaches = runner.breaches();
    if !violations.is_empty() || !breaches.is_empty() {
        for (at, node, violation) in violations {
            error!(?at, %node, %violation, "protocol violation");
        }
        for (at, breach) in breaches {
            error!(?at, %breach, "invariant breach");
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}
