//! Proposer state machine.

use crate::config::{ProtocolConfig, Variant};
use gpaxos_core::{Action, Address, Event, ProtocolMessage, Role, StateMachine};
use gpaxos_types::{BallotId, Policy};
use std::time::Duration;
use tracing::{debug, trace};

/// A proposer: turns scheduled commands into protocol traffic.
///
/// Keeps every policy it ever proposed, in arrival order. Insistence
/// re-sends the whole list; duplicates are harmless because cstructs
/// deduplicate and deciding a command twice is a no-op.
#[derive(Debug, Clone)]
pub struct ProposerState {
    index: u32,
    config: ProtocolConfig,
    proposed: Vec<Policy>,
    now: Duration,
}

impl ProposerState {
    pub fn new(index: u32, config: ProtocolConfig) -> Self {
        Self {
            index,
            config,
            proposed: Vec::new(),
            now: Duration::ZERO,
        }
    }

    /// Every policy this proposer has proposed, in arrival order.
    pub fn proposed(&self) -> &[Policy] {
        &self.proposed
    }

    fn send(&self, policy: Policy) -> Action {
        match self.config.variant {
            Variant::Classic => Action::Send {
                to: Address::new(Role::Leader, 0),
                message: ProtocolMessage::Proposal { policy },
            },
            // The ballot on a fast proposal is the proposer's view only;
            // acceptors apply the policy at their own ballot.
            Variant::Fast => Action::Broadcast {
                role: Role::Acceptor,
                message: ProtocolMessage::FastProposal {
                    policy,
                    ballot: BallotId::NONE,
                },
            },
        }
    }
}

impl StateMachine for ProposerState {
    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::ProposeCommand { policy } => {
                debug!(at = ?self.now, proposer = self.index, %policy, "proposing");
                self.proposed.push(policy.clone());
                vec![self.send(policy)]
            }

            Event::InsistTimer => {
                if self.proposed.is_empty() {
                    return Vec::new();
                }
                debug!(
                    proposer = self.index,
                    count = self.proposed.len(),
                    "re-sending all proposals"
                );
                self.proposed
                    .clone()
                    .into_iter()
                    .map(|policy| self.send(policy))
                    .collect()
            }

            other => {
                trace!(
                    proposer = self.index,
                    event = other.type_name(),
                    "ignoring event not addressed to proposers"
                );
                Vec::new()
            }
        }
    }
}
