//! Acceptor state machine.

use crate::config::{ProtocolConfig, Variant};
use gpaxos_core::{Action, Address, Event, ProtocolMessage, ProtocolViolation, Role, StateMachine};
use gpaxos_types::{AcceptorId, BallotId, Configuration, Policy};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// An acceptor: the replicated memory of the protocol.
///
/// State is `(ballot, cstruct)`, initially `(-1, ∅)`. The ballot only ever
/// increases. In Classic the cstruct only ever grows under `extends`; in
/// Fast a recovery ballot may replace a divergent fast-path cstruct with
/// the leader's reconciled one.
#[derive(Debug, Clone)]
pub struct AcceptorState {
    id: AcceptorId,
    config: ProtocolConfig,
    ballot: BallotId,
    cstruct: Configuration,
    now: Duration,
}

impl AcceptorState {
    pub fn new(id: AcceptorId, config: ProtocolConfig) -> Self {
        Self {
            id,
            config,
            ballot: BallotId::NONE,
            cstruct: Configuration::new(),
            now: Duration::ZERO,
        }
    }

    pub fn id(&self) -> AcceptorId {
        self.id
    }

    pub fn ballot(&self) -> BallotId {
        self.ballot
    }

    pub fn cstruct(&self) -> &Configuration {
        &self.cstruct
    }

    /// Announce the current cstruct to the learners, and in Fast also to
    /// the leader (which watches for fast-path divergence).
    fn announce(&self) -> Vec<Action> {
        let message = ProtocolMessage::Phase2b {
            acceptor: self.id,
            ballot: self.ballot,
            cstruct: self.cstruct.clone(),
        };
        let mut actions = vec![Action::Broadcast {
            role: Role::Learner,
            message: message.clone(),
        }];
        if self.config.variant.is_fast() {
            actions.push(Action::Send {
                to: Address::new(Role::Leader, 0),
                message,
            });
        }
        actions
    }

    fn on_phase1a(&mut self, ballot: BallotId) -> Vec<Action> {
        if ballot <= self.ballot {
            trace!(acceptor = %self.id, heard = %ballot, current = %self.ballot, "ignoring stale phase1a");
            return Vec::new();
        }
        debug!(at = ?self.now, acceptor = %self.id, %ballot, "promising");
        self.ballot = ballot;
        vec![Action::Send {
            to: Address::new(Role::Leader, 0),
            message: ProtocolMessage::Phase1b {
                acceptor: self.id,
                ballot,
                cstruct: self.cstruct.clone(),
            },
        }]
    }

    fn on_phase2a(&mut self, ballot: BallotId, cstruct: Configuration) -> Vec<Action> {
        match self.config.variant {
            Variant::Classic => {
                if ballot != self.ballot {
                    trace!(acceptor = %self.id, heard = %ballot, current = %self.ballot, "ignoring phase2a for other ballot");
                    return Vec::new();
                }
                if !cstruct.extends(&self.cstruct) {
                    warn!(acceptor = %self.id, %ballot, "phase2a does not extend local cstruct, dropping");
                    return vec![Action::ReportViolation {
                        violation: ProtocolViolation::NonExtendingPhase2a {
                            acceptor: self.id,
                            ballot,
                        },
                    }];
                }
                self.cstruct = cstruct;
                self.announce()
            }

            Variant::Fast => {
                // Recovery semantics: a ballot at or above ours carries the
                // leader's reconciliation of a promise quorum and wins over
                // whatever the fast path left here.
                if ballot < self.ballot {
                    trace!(acceptor = %self.id, heard = %ballot, current = %self.ballot, "ignoring stale phase2a");
                    return Vec::new();
                }
                if !cstruct.extends(&self.cstruct) {
                    debug!(acceptor = %self.id, %ballot, "recovery replaces divergent fast-path cstruct");
                }
                self.ballot = ballot;
                self.cstruct = cstruct;
                self.announce()
            }
        }
    }

    fn on_fast_proposal(&mut self, policy: Policy) -> Vec<Action> {
        let (decided, next) = self.cstruct.accept_or_reject(policy);
        trace!(acceptor = %self.id, outcome = %decided, "applied fast proposal");
        self.cstruct = next;
        // Announce even when the decision was already present so lost
        // phase2b messages get another chance.
        self.announce()
    }
}

impl StateMachine for AcceptorState {
    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::Phase1aReceived { ballot } => self.on_phase1a(ballot),
            Event::Phase2aReceived { ballot, cstruct } => self.on_phase2a(ballot, cstruct),
            Event::FastProposalReceived { policy, .. } => self.on_fast_proposal(policy),
            other => {
                trace!(acceptor = %self.id, event = other.type_name(), "ignoring event not addressed to acceptors");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpaxos_types::{Acceptance, Members};

    fn config(variant: Variant) -> ProtocolConfig {
        ProtocolConfig::new(
            variant,
            Members {
                proposers: 1,
                acceptors: 3,
                learners: 1,
            },
        )
    }

    fn good(name: &str) -> Policy {
        Policy::Good(name.into())
    }

    fn bad(name: &str) -> Policy {
        Policy::Bad(name.into())
    }

    fn cstruct_of(entries: Vec<Acceptance<Policy>>) -> Configuration {
        Configuration::try_from_entries(entries).unwrap()
    }

    #[test]
    fn promises_only_newer_ballots() {
        let mut acceptor = AcceptorState::new(AcceptorId(1), config(Variant::Classic));
        assert_eq!(acceptor.ballot(), BallotId::NONE);

        let actions = acceptor.handle(Event::Phase1aReceived { ballot: BallotId(0) });
        assert_eq!(acceptor.ballot(), BallotId(0));
        assert_eq!(actions.len(), 1);

        // Same ballot again: no promise.
        let actions = acceptor.handle(Event::Phase1aReceived { ballot: BallotId(0) });
        assert!(actions.is_empty());

        // Older ballot: no promise, ballot untouched.
        let actions = acceptor.handle(Event::Phase1aReceived {
            ballot: BallotId::NONE,
        });
        assert!(actions.is_empty());
        assert_eq!(acceptor.ballot(), BallotId(0));
    }

    #[test]
    fn classic_adopts_extensions_at_current_ballot() {
        let mut acceptor = AcceptorState::new(AcceptorId(1), config(Variant::Classic));
        acceptor.handle(Event::Phase1aReceived { ballot: BallotId(0) });

        let extension = cstruct_of(vec![Acceptance::Accepted(good("p1"))]);
        let actions = acceptor.handle(Event::Phase2aReceived {
            ballot: BallotId(0),
            cstruct: extension.clone(),
        });
        assert_eq!(acceptor.cstruct(), &extension);
        // Classic announces to learners only.
        assert_eq!(actions.len(), 1);
        assert!(matches!(
            &actions[0],
            Action::Broadcast {
                role: Role::Learner,
                ..
            }
        ));
    }

    #[test]
    fn classic_drops_non_extending_phase2a() {
        let mut acceptor = AcceptorState::new(AcceptorId(1), config(Variant::Classic));
        acceptor.handle(Event::Phase1aReceived { ballot: BallotId(0) });
        acceptor.handle(Event::Phase2aReceived {
            ballot: BallotId(0),
            cstruct: cstruct_of(vec![Acceptance::Accepted(bad("b1"))]),
        });

        // A payload missing the adopted entry is not an extension.
        let actions = acceptor.handle(Event::Phase2aReceived {
            ballot: BallotId(0),
            cstruct: cstruct_of(vec![Acceptance::Accepted(bad("b2"))]),
        });
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], Action::ReportViolation { .. }));
        assert!(acceptor.cstruct().contains(&bad("b1")));
        assert!(!acceptor.cstruct().contains(&bad("b2")));
    }

    #[test]
    fn classic_ignores_phase2a_for_other_ballots() {
        let mut acceptor = AcceptorState::new(AcceptorId(1), config(Variant::Classic));
        acceptor.handle(Event::Phase1aReceived { ballot: BallotId(1) });

        let actions = acceptor.handle(Event::Phase2aReceived {
            ballot: BallotId(0),
            cstruct: cstruct_of(vec![Acceptance::Accepted(good("p1"))]),
        });
        assert!(actions.is_empty());
        assert!(acceptor.cstruct().is_empty());
    }

    #[test]
    fn fast_proposal_is_applied_locally() {
        let mut acceptor = AcceptorState::new(AcceptorId(1), config(Variant::Fast));
        let actions = acceptor.handle(Event::FastProposalReceived {
            policy: bad("b1"),
            ballot: BallotId::NONE,
        });
        assert!(acceptor.cstruct().contains(&bad("b1")));
        // Learners and the leader both hear about it.
        assert_eq!(actions.len(), 2);

        // A conflicting fast proposal is rejected, not refused.
        acceptor.handle(Event::FastProposalReceived {
            policy: bad("b2"),
            ballot: BallotId::NONE,
        });
        assert!(acceptor
            .cstruct()
            .contains_acceptance(&Acceptance::Rejected(bad("b2"))));
    }

    #[test]
    fn fast_recovery_overrides_divergent_cstruct() {
        let mut acceptor = AcceptorState::new(AcceptorId(1), config(Variant::Fast));
        acceptor.handle(Event::FastProposalReceived {
            policy: bad("b2"),
            ballot: BallotId::NONE,
        });
        acceptor.handle(Event::Phase1aReceived { ballot: BallotId(0) });

        // The reconciled outcome chose b1; it does not extend our view.
        let reconciled = cstruct_of(vec![
            Acceptance::Accepted(bad("b1")),
            Acceptance::Rejected(bad("b2")),
        ]);
        let actions = acceptor.handle(Event::Phase2aReceived {
            ballot: BallotId(0),
            cstruct: reconciled.clone(),
        });
        assert_eq!(acceptor.cstruct(), &reconciled);
        assert!(actions
            .iter()
            .all(|a| !matches!(a, Action::ReportViolation { .. })));
    }
}
