//! Role state machines for generalized Paxos.
//!
//! This crate provides synchronous implementations of the four protocol
//! roles that can be driven by any runner honoring the event/action
//! contract of `gpaxos-core`.
//!
//! # Architecture
//!
//! Each role processes events synchronously:
//!
//! - Proposer: `Event::ProposeCommand` → forward the policy (to the leader
//!   in Classic, to the acceptors in Fast); `Event::InsistTimer` → re-send
//!   everything proposed so far.
//! - Leader: `Event::BallotTimer` → open a ballot (phase 1a);
//!   `Event::Phase1bReceived` → on quorum, combine and announce the
//!   extension (phase 2a); `Event::Phase2bReceived` → record, and in Fast
//!   watch for fast-path divergence.
//! - Acceptor: promise on newer ballots, adopt announced extensions,
//!   apply fast proposals locally.
//! - Learner: combine acceptor cstructs on quorum and grow the learned
//!   cstruct monotonically.
//!
//! All I/O is performed by the runner via returned `Action`s.
//!
//! # Safety
//!
//! - **Ballot monotonicity**: an acceptor never promises or adopts a
//!   ballot below the highest it has heard.
//! - **Quorum intersection**: two classic quorums share an acceptor; two
//!   fast quorums share a classic majority. The latter is why fast-path
//!   recovery combines a fast quorum of promises at classic majority:
//!   any fast-learned acceptance has majority support inside every fast
//!   quorum and therefore survives into the recovery extension.
//! - **Monotone learning**: learners only ever replace `learned` with an
//!   extension of it.
//!
//! # Liveness
//!
//! Ballots are opened by the topology's ballot schedule, not by retries:
//! a ballot that never gathers a quorum of promises is simply superseded
//! by the next one, and its policies carry forward. Proposal retransmission
//! is the proposer's insistence schedule.

mod acceptor;
mod config;
mod leader;
mod learner;
mod node;
mod proposer;

pub use acceptor::AcceptorState;
pub use config::{ProtocolConfig, Variant};
pub use leader::LeaderState;
pub use learner::LearnerState;
pub use node::RoleStateMachine;
pub use proposer::ProposerState;
