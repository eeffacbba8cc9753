//! Event types for the deterministic state machines.

use gpaxos_types::{AcceptorId, BallotId, Configuration, Policy};

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Consequences of prior event processing.
    Internal = 0,

    /// Timers scheduled by the node itself or by the topology schedules.
    Timer = 1,

    /// External inputs from other roles.
    Network = 2,

    /// External inputs from the proposal schedule (clients).
    Client = 3,
}

/// All possible events a role can receive.
///
/// Events are **passive data**; the state machine processes them and
/// returns actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════
    // Timers (priority: Timer)
    // ═══════════════════════════════════════════════════════════════════
    /// Leader: time to open the next ballot (phase 1a).
    BallotTimer,

    /// Leader (fast): time to run the scheduled recovery ballot.
    RecoveryTimer,

    /// Proposer: time to re-send everything proposed so far.
    InsistTimer,

    // ═══════════════════════════════════════════════════════════════════
    // Client input (priority: Client)
    // ═══════════════════════════════════════════════════════════════════
    /// Proposer: the schedule produced a policy to replicate.
    ProposeCommand { policy: Policy },

    // ═══════════════════════════════════════════════════════════════════
    // Network messages (priority: Network)
    // ═══════════════════════════════════════════════════════════════════
    /// Leader: a proposer forwarded a policy (classic path).
    ProposalReceived { policy: Policy },

    /// Acceptor: a proposer sent a policy on the fast path.
    FastProposalReceived { policy: Policy, ballot: BallotId },

    /// Acceptor: the leader opened a ballot.
    Phase1aReceived { ballot: BallotId },

    /// Leader: an acceptor promised, carrying its cstruct.
    Phase1bReceived {
        acceptor: AcceptorId,
        ballot: BallotId,
        cstruct: Configuration,
    },

    /// Acceptor: the leader proposed an extension.
    Phase2aReceived {
        ballot: BallotId,
        cstruct: Configuration,
    },

    /// Learner (and Leader in fast): an acceptor announced its cstruct.
    Phase2bReceived {
        acceptor: AcceptorId,
        ballot: BallotId,
        cstruct: Configuration,
    },
}

impl Event {
    /// Get the priority for this event type.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::BallotTimer | Event::RecoveryTimer | Event::InsistTimer => EventPriority::Timer,

            Event::ProposeCommand { .. } => EventPriority::Client,

            Event::ProposalReceived { .. }
            | Event::FastProposalReceived { .. }
            | Event::Phase1aReceived { .. }
            | Event::Phase1bReceived { .. }
            | Event::Phase2aReceived { .. }
            | Event::Phase2bReceived { .. } => EventPriority::Network,
        }
    }

    /// Get the event type name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::BallotTimer => "BallotTimer",
            Event::RecoveryTimer => "RecoveryTimer",
            Event::InsistTimer => "InsistTimer",
            Event::ProposeCommand { .. } => "ProposeCommand",
            Event::ProposalReceived { .. } => "ProposalReceived",
            Event::FastProposalReceived { .. } => "FastProposalReceived",
            Event::Phase1aReceived { .. } => "Phase1aReceived",
            Event::Phase1bReceived { .. } => "Phase1bReceived",
            Event::Phase2aReceived { .. } => "Phase2aReceived",
            Event::Phase2bReceived { .. } => "Phase2bReceived",
        }
    }
}
