//! Action types for the deterministic state machines.

use crate::message::{Address, ProtocolMessage, Role};
use crate::TimerId;
use gpaxos_types::{Acceptance, AcceptorId, BallotId, Policy};
use std::time::Duration;

/// Actions a role state machine wants to perform.
///
/// Actions are **commands**; the runner executes them and may convert
/// results back into events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a message to one role instance.
    Send {
        to: Address,
        message: ProtocolMessage,
    },

    /// Broadcast a message to every instance of a role class.
    Broadcast { role: Role, message: ProtocolMessage },

    /// Set a timer to fire after a duration. Re-setting an armed timer
    /// replaces it.
    SetTimer { id: TimerId, duration: Duration },

    /// Cancel a previously set timer.
    CancelTimer { id: TimerId },

    /// Learner: these acceptances just became learned.
    EmitLearned { commands: Vec<Acceptance<Policy>> },

    /// A recoverable protocol violation was observed. The offending
    /// message has been discarded; the run continues.
    ReportViolation { violation: ProtocolViolation },
}

impl Action {
    /// Get the action type name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Send { .. } => "Send",
            Action::Broadcast { .. } => "Broadcast",
            Action::SetTimer { .. } => "SetTimer",
            Action::CancelTimer { .. } => "CancelTimer",
            Action::EmitLearned { .. } => "EmitLearned",
            Action::ReportViolation { .. } => "ReportViolation",
        }
    }
}

/// Recoverable protocol violations, accumulated per run.
///
/// Tests assert the log is empty; the simulator exits non-zero when it
/// is not.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// An acceptor received a `Phase2a` at its current ballot whose
    /// payload does not extend its local cstruct.
    #[error("phase2a at {ballot} does not extend the cstruct of {acceptor}")]
    NonExtendingPhase2a {
        acceptor: AcceptorId,
        ballot: BallotId,
    },

    /// A combination over a quorum of votes came out contradictory.
    #[error("contradictory combination at {observer}")]
    ContradictoryCombination { observer: Address },

    /// A phase2a payload failed to cover the intersection of the 1b
    /// cstructs it was derived from.
    #[error("phase2a for {ballot} does not extend the lub of its phase1b quorum")]
    NonCoveringPhase2a { ballot: BallotId },
}
