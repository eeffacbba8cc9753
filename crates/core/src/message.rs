//! Protocol messages exchanged between roles.

use crate::Event;
use gpaxos_types::{AcceptorId, BallotId, Configuration, Policy};

/// The four protocol roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Proposer,
    Leader,
    Acceptor,
    Learner,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Proposer => "proposer",
            Role::Leader => "leader",
            Role::Acceptor => "acceptor",
            Role::Learner => "learner",
        };
        f.write_str(name)
    }
}

/// Logical address of a role instance. The transport resolves this; no
/// physical endpoints appear anywhere in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    pub role: Role,
    /// Zero-based index within the role class.
    pub index: u32,
}

impl Address {
    pub fn new(role: Role, index: u32) -> Self {
        Self { role, index }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.role, self.index)
    }
}

/// One-way messages between roles.
///
/// The runner handles delivery; a delivered message is converted into the
/// receiving role's [`Event`] with [`ProtocolMessage::into_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// Proposer → Leader (classic): replicate this policy.
    Proposal { policy: Policy },

    /// Proposer → Acceptors (fast): apply this policy directly. The ballot
    /// is the proposer's view and is informational; acceptors apply fast
    /// proposals at their own ballot.
    FastProposal { policy: Policy, ballot: BallotId },

    /// Leader → Acceptors: open a ballot.
    Phase1a { ballot: BallotId },

    /// Acceptor → Leader: promise, carrying the acceptor's cstruct.
    Phase1b {
        acceptor: AcceptorId,
        ballot: BallotId,
        cstruct: Configuration,
    },

    /// Leader → Acceptors: proposed extension for the open ballot.
    Phase2a {
        ballot: BallotId,
        cstruct: Configuration,
    },

    /// Acceptor → Learners (and Leader in fast): accepted cstruct.
    Phase2b {
        acceptor: AcceptorId,
        ballot: BallotId,
        cstruct: Configuration,
    },
}

impl ProtocolMessage {
    /// Convert a delivered message into the receiver's event.
    pub fn into_event(self) -> Event {
        match self {
            ProtocolMessage::Proposal { policy } => Event::ProposalReceived { policy },
            ProtocolMessage::FastProposal { policy, ballot } => {
                Event::FastProposalReceived { policy, ballot }
            }
            ProtocolMessage::Phase1a { ballot } => Event::Phase1aReceived { ballot },
            ProtocolMessage::Phase1b {
                acceptor,
                ballot,
                cstruct,
            } => Event::Phase1bReceived {
                acceptor,
                ballot,
                cstruct,
            },
            ProtocolMessage::Phase2a { ballot, cstruct } => {
                Event::Phase2aReceived { ballot, cstruct }
            }
            ProtocolMessage::Phase2b {
                acceptor,
                ballot,
                cstruct,
            } => Event::Phase2bReceived {
                acceptor,
                ballot,
                cstruct,
            },
        }
    }

    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            ProtocolMessage::Proposal { .. } => "Proposal",
            ProtocolMessage::FastProposal { .. } => "FastProposal",
            ProtocolMessage::Phase1a { .. } => "Phase1a",
            ProtocolMessage::Phase1b { .. } => "Phase1b",
            ProtocolMessage::Phase2a { .. } => "Phase2a",
            ProtocolMessage::Phase2b { .. } => "Phase2b",
        }
    }
}
