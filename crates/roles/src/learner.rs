//! Learner state machine.

use crate::config::ProtocolConfig;
use gpaxos_core::{Action, Address, Event, ProtocolViolation, Role, StateMachine};
use gpaxos_types::{combination, AcceptorId, BallotId, Configuration, Votes};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// A learner: combines acceptor announcements into the learned cstruct.
///
/// `learned` grows monotonically under `extends`; every newly learned
/// acceptance is emitted exactly once via `Action::EmitLearned`.
#[derive(Debug, Clone)]
pub struct LearnerState {
    index: u32,
    votes: Votes<Configuration>,
    learned: Configuration,
    now: Duration,
}

impl LearnerState {
    pub fn new(index: u32, config: ProtocolConfig) -> Self {
        Self {
            index,
            votes: Votes::new(config.variant.learner_quorum(config.members.acceptors)),
            learned: Configuration::new(),
            now: Duration::ZERO,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn learned(&self) -> &Configuration {
        &self.learned
    }

    pub fn votes(&self) -> &Votes<Configuration> {
        &self.votes
    }

    fn on_phase2b(
        &mut self,
        acceptor: AcceptorId,
        ballot: BallotId,
        cstruct: Configuration,
    ) -> Vec<Action> {
        trace!(learner = self.index, %acceptor, %ballot, "recording announcement");
        self.votes.insert(acceptor, cstruct);
        if !self.votes.is_quorum() {
            return Vec::new();
        }

        let combined = match combination(&self.votes) {
            Ok(combined) => combined,
            Err(err) => {
                warn!(learner = self.index, %err, "announcements combined contradictorily");
                return vec![Action::ReportViolation {
                    violation: ProtocolViolation::ContradictoryCombination {
                        observer: Address::new(Role::Learner, self.index),
                    },
                }];
            }
        };

        if combined == self.learned {
            return Vec::new();
        }
        if !combined.extends(&self.learned) {
            // Acceptor cstructs grow monotonically, so support can only
            // grow; a regression here means the vote set is malformed.
            debug!(learner = self.index, "combination regressed, keeping learned");
            return Vec::new();
        }

        let newly = combined.difference(&self.learned);
        info!(
            at = ?self.now,
            learner = self.index,
            newly = newly.len(),
            total = combined.len(),
            "learned"
        );
        self.learned = combined;
        vec![Action::EmitLearned { commands: newly }]
    }
}

impl StateMachine for LearnerState {
    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::Phase2bReceived {
                acceptor,
                ballot,
                cstruct,
            } => self.on_phase2b(acceptor, ballot, cstruct),
            other => {
                trace!(
                    learner = self.index,
                    event = other.type_name(),
                    "ignoring event not addressed to learners"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProtocolConfig, Variant};
    use gpaxos_types::{Acceptance, Members, Policy};

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

    fn cstruct_of(entries: Vec<Acceptance<Policy>>) -> Configuration {
        Configuration::try_from_entries(entries).unwrap()
    }

    fn phase2b(acceptor: u32, cstruct: Configuration) -> Event {
        Event::Phase2bReceived {
            acceptor: AcceptorId(acceptor),
            ballot: BallotId(0),
            cstruct,
        }
    }

    #[test]
    fn learns_on_quorum() {
        let mut learner = LearnerState::new(0, config(Variant::Classic));
        let announced = cstruct_of(vec![Acceptance::Accepted(good("p1"))]);

        assert!(learner.handle(phase2b(1, announced.clone())).is_empty());
        let actions = learner.handle(phase2b(2, announced.clone()));
        assert_eq!(
            actions,
            vec![Action::EmitLearned {
                commands: vec![Acceptance::Accepted(good("p1"))],
            }]
        );
        assert!(learner.learned().contains(&good("p1")));
    }

    #[test]
    fn each_acceptance_is_emitted_once() {
        let mut learner = LearnerState::new(0, config(Variant::Classic));
        let announced = cstruct_of(vec![Acceptance::Accepted(good("p1"))]);

        learner.handle(phase2b(1, announced.clone()));
        learner.handle(phase2b(2, announced.clone()));
        // Further agreeing announcements add nothing new.
        assert!(learner.handle(phase2b(3, announced.clone())).is_empty());
        assert!(learner.handle(phase2b(1, announced)).is_empty());
    }

    #[test]
    fn learning_is_monotone() {
        let mut learner = LearnerState::new(0, config(Variant::Classic));
        let first = cstruct_of(vec![Acceptance::Accepted(good("p1"))]);
        let second = first.add(Acceptance::Accepted(good("p2"))).unwrap();

        learner.handle(phase2b(1, first.clone()));
        learner.handle(phase2b(2, first.clone()));
        let before = learner.learned().clone();

        learner.handle(phase2b(1, second.clone()));
        let actions = learner.handle(phase2b(2, second));
        assert!(learner.learned().extends(&before));
        assert_eq!(
            actions,
            vec![Action::EmitLearned {
                commands: vec![Acceptance::Accepted(good("p2"))],
            }]
        );
    }

    #[test]
    fn fast_learner_needs_three_quarters() {
        let mut learner = LearnerState::new(0, config(Variant::Fast));
        let announced = cstruct_of(vec![Acceptance::Accepted(good("p1"))]);

        // Two of three is a classic quorum but not a fast one.
        assert!(learner.handle(phase2b(1, announced.clone())).is_empty());
        assert!(learner.handle(phase2b(2, announced.clone())).is_empty());
        let actions = learner.handle(phase2b(3, announced));
        assert_eq!(actions.len(), 1);
        assert!(learner.learned().contains(&good("p1")));
    }
}
