//! Core types for generalized Paxos.
//!
//! This crate provides the foundational types used throughout the protocol
//! implementation:
//!
//! - **Identifiers**: [`AcceptorId`], [`BallotId`], [`Members`]
//! - **Commands**: the [`Command`] conflict relation and the [`Policy`] test domain
//! - **CStructs**: [`CStruct`], the partially-ordered conflict-free command set
//! - **Quorums**: [`MajorityFamily`] and the [`Votes`] container
//! - **Combination**: quorum-wise reconciliation of acceptor cstructs
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer. Everything
//! in it is pure data and pure functions; all protocol behavior lives in the
//! role state machines built on top.

mod combination;
mod cstruct;
mod policy;
mod quorum;
mod votes;

pub use combination::{combination, combination_by_quorums, CombinationError};
pub use cstruct::{Acceptance, CStruct, CStructError, Configuration};
pub use policy::{Command, Policy};
pub use quorum::MajorityFamily;
pub use votes::Votes;

use serde::{Deserialize, Serialize};

/// Identity of an acceptor, stable for a run. 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AcceptorId(pub u32);

impl std::fmt::Display for AcceptorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "acceptor#{}", self.0)
    }
}

/// Totally ordered ballot number.
///
/// The initial value is [`BallotId::NONE`] (-1), meaning "nothing heard yet".
/// Ballots are strictly monotonic within any acceptor's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BallotId(pub i64);

impl BallotId {
    /// The pre-protocol ballot: nothing has been heard.
    pub const NONE: BallotId = BallotId(-1);

    /// The next ballot in sequence.
    pub fn next(self) -> BallotId {
        BallotId(self.0 + 1)
    }
}

impl std::fmt::Display for BallotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ballot#{}", self.0)
    }
}

/// Sizes of each role class in a topology.
///
/// The leader is always a singleton and is not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Members {
    /// Number of proposers. Almost always 1.
    #[serde(default = "default_proposers")]
    pub proposers: usize,
    /// Number of acceptors.
    pub acceptors: usize,
    /// Number of learners.
    pub learners: usize,
}

fn default_proposers() -> usize {
    1
}

impl Members {
    /// Validate member counts before launch.
    pub fn validate(&self) -> Result<(), MembersError> {
        if self.proposers == 0 {
            return Err(MembersError::NoProposers);
        }
        if self.acceptors == 0 {
            return Err(MembersError::NoAcceptors);
        }
        if self.learners == 0 {
            return Err(MembersError::NoLearners);
        }
        Ok(())
    }

    /// Total node count including the singleton leader.
    pub fn total(&self) -> usize {
        self.proposers + 1 + self.acceptors + self.learners
    }
}

/// Errors for impossible member configurations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MembersError {
    #[error("at least one proposer is required")]
    NoProposers,

    #[error("at least one acceptor is required")]
    NoAcceptors,

    #[error("at least one learner is required")]
    NoLearners,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ballot_ordering() {
        assert!(BallotId::NONE < BallotId(0));
        assert!(BallotId(0) < BallotId(1));
        assert_eq!(BallotId::NONE.next(), BallotId(0));
        assert_eq!(BallotId(3).next(), BallotId(4));
    }

    #[test]
    fn members_validation() {
        let ok = Members {
            proposers: 1,
            acceptors: 3,
            learners: 1,
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.total(), 6);

        let bad = Members {
            proposers: 1,
            acceptors: 0,
            learners: 1,
        };
        assert_eq!(bad.validate(), Err(MembersError::NoAcceptors));
    }
}
