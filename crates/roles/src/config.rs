//! Protocol configuration shared by every role.

use gpaxos_types::{MajorityFamily, Members};
use std::time::Duration;

/// Which flavor of the protocol a topology runs.
///
/// The variant is a value, not a type: roles dispatch on it with plain
/// `match`, and it selects the quorum families and message routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Two-phase ballots through the leader, majority quorums.
    Classic,
    /// Direct proposer-to-acceptor fast path at three-quarter quorums,
    /// classic ballots for recovery.
    Fast,
}

impl Variant {
    pub fn is_fast(self) -> bool {
        matches!(self, Variant::Fast)
    }

    /// Family gating a ballot's phase-1b promise set.
    pub fn ballot_quorum(self, acceptors: usize) -> MajorityFamily {
        match self {
            Variant::Classic => MajorityFamily::classic(acceptors),
            Variant::Fast => MajorityFamily::fast(acceptors),
        }
    }

    /// Family a learner combines phase-2b votes at.
    pub fn learner_quorum(self, acceptors: usize) -> MajorityFamily {
        match self {
            Variant::Classic => MajorityFamily::classic(acceptors),
            Variant::Fast => MajorityFamily::fast(acceptors),
        }
    }

    /// Family the leader combines a promise quorum at. Classic majority in
    /// both variants; see the crate docs for why recovery must not use the
    /// fast family here.
    pub fn combination_quorum(self, acceptors: usize) -> MajorityFamily {
        MajorityFamily::classic(acceptors)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Classic => f.write_str("classic"),
            Variant::Fast => f.write_str("fast"),
        }
    }
}

/// Static configuration for one protocol run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub variant: Variant,
    pub members: Members,
    /// How long the leader waits after detecting fast-path divergence
    /// before opening a recovery ballot. Fast variant only.
    pub recovery_delay: Duration,
}

impl ProtocolConfig {
    pub fn new(variant: Variant, members: Members) -> Self {
        Self {
            variant,
            members,
            recovery_delay: Duration::from_secs(1),
        }
    }

    pub fn with_recovery_delay(mut self, delay: Duration) -> Self {
        self.recovery_delay = delay;
        self
    }
}
