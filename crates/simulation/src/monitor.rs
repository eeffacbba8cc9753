//! Observable state snapshots and the testable property predicates.

use gpaxos_core::Address;
use gpaxos_roles::{AcceptorState, LeaderState, LearnerState, ProposerState};
use gpaxos_types::{BallotId, Command, Policy};

/// A consistent snapshot of every role state in the topology.
///
/// Role handlers are atomic steps in the simulation, so a snapshot taken
/// between events is exactly the "atomic snapshot" the concurrency model
/// promises.
#[derive(Debug, Clone)]
pub struct AllStates {
    pub proposers: Vec<ProposerState>,
    pub leader: LeaderState,
    pub acceptors: Vec<AcceptorState>,
    pub learners: Vec<LearnerState>,
}

/// Invariant breaches detected by the runner while observing state
/// transitions. A clean run has none.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorBreach {
    #[error("ballot regressed at {node}: {from} -> {to}")]
    BallotRegressed {
        node: Address,
        from: BallotId,
        to: BallotId,
    },

    #[error("acceptor cstruct shrank at {node}")]
    CStructShrank { node: Address },

    #[error("learned cstruct shrank at {node}")]
    LearnedShrank { node: Address },

    #[error("acceptance learned twice at {node}")]
    DuplicateLearn { node: Address },
}

/// Invariant 2: no learner's `learned` is contradictory.
pub fn learned_non_contradictory(states: &AllStates) -> bool {
    states
        .learners
        .iter()
        .all(|learner| !learner.learned().is_contradictory())
}

/// Invariant 3: everything learned (either way) was proposed.
pub fn learned_were_proposed(states: &AllStates, proposed: &[Policy]) -> bool {
    states.learners.iter().all(|learner| {
        learner
            .learned()
            .iter()
            .all(|acceptance| proposed.contains(acceptance.command()))
    })
}

/// Eventual property 6: every proposed policy is decided, either way, at
/// every learner.
pub fn all_proposed_decided(states: &AllStates, proposed: &[Policy]) -> bool {
    states.learners.iter().all(|learner| {
        proposed
            .iter()
            .all(|policy| learner.learned().contains(policy))
    })
}

/// Eventual property 7: all learners learned the same cstruct.
pub fn learners_agree(states: &AllStates) -> bool {
    let mut learners = states.learners.iter();
    let Some(first) = learners.next() else {
        return true;
    };
    learners.all(|learner| learner.learned() == first.learned())
}

/// Eventual property 8: when all proposed policies pairwise conflict,
/// exactly one is accepted and the rest are rejected.
pub fn single_acceptance_among_conflicting(states: &AllStates, proposed: &[Policy]) -> bool {
    debug_assert!(proposed
        .iter()
        .all(|p| proposed.iter().all(|q| p == q || p.conflicts(q))));
    states.learners.iter().all(|learner| {
        let accepted = learner.learned().accepted().count();
        accepted == 1 && all_proposed_decided(states, proposed)
    })
}
