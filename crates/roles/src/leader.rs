//! Leader state machine.

use crate::config::ProtocolConfig;
use gpaxos_core::{
    Action, Address, Event, ProtocolMessage, ProtocolViolation, Role, StateMachine, TimerId,
};
use gpaxos_types::{combination, AcceptorId, BallotId, Configuration, Policy, Votes};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// The singleton leader: runs two-phase ballots over the acceptors.
///
/// # Ballot lifecycle
///
/// 1. `Event::BallotTimer` → open the next ballot: fix its policy set from
///    the pending queue and broadcast `Phase1a`.
/// 2. `Event::Phase1bReceived` → collect promises; on quorum, combine the
///    promised cstructs, extend the result by accept-or-reject over the
///    ballot's policies, and broadcast `Phase2a`.
/// 3. `Event::Phase2bReceived` → record the acceptor's adoption.
///
/// A ballot that never reaches a promise quorum is simply superseded by
/// the next `BallotTimer`; its policies stay pending and carry forward.
///
/// In the Fast variant the leader additionally watches the acceptors'
/// fast-path announcements. When the heard votes can no longer agree on
/// some policy at a fast quorum, it schedules one recovery ballot after
/// the configured delay.
#[derive(Debug, Clone)]
pub struct LeaderState {
    config: ProtocolConfig,

    // ═══════════════════════════════════════════════════════════════════
    // Ballot state
    // ═══════════════════════════════════════════════════════════════════
    /// The currently open ballot; `BallotId::NONE` before the first.
    ballot: BallotId,

    /// Proposals waiting for the next ballot, in arrival order.
    pending: Vec<Policy>,

    /// The policy set fixed per ballot at phase-1a time.
    ballot_policies: BTreeMap<BallotId, Vec<Policy>>,

    /// Promises for the current ballot.
    phase1b_votes: Votes<Configuration>,

    /// Whether phase 2a went out for the current ballot.
    announced: bool,

    /// Adoption records per ballot.
    phase2b_votes: BTreeMap<BallotId, Votes<Configuration>>,

    // ═══════════════════════════════════════════════════════════════════
    // Fast path monitoring (Fast variant only)
    // ═══════════════════════════════════════════════════════════════════
    /// Latest cstruct heard from each acceptor.
    fast_votes: Votes<Configuration>,

    /// A recovery ballot has been scheduled and not yet run.
    recovery_pending: bool,

    now: Duration,
}

impl LeaderState {
    pub fn new(config: ProtocolConfig) -> Self {
        let acceptors = config.members.acceptors;
        Self {
            config,
            ballot: BallotId::NONE,
            pending: Vec::new(),
            ballot_policies: BTreeMap::new(),
            phase1b_votes: Votes::new(config.variant.ballot_quorum(acceptors)),
            announced: false,
            phase2b_votes: BTreeMap::new(),
            fast_votes: Votes::new(config.variant.learner_quorum(acceptors)),
            recovery_pending: false,
            now: Duration::ZERO,
        }
    }

    pub fn ballot(&self) -> BallotId {
        self.ballot
    }

    pub fn pending(&self) -> &[Policy] {
        &self.pending
    }

    /// The policy set fixed for a ballot, if one was opened.
    pub fn policies_for(&self, ballot: BallotId) -> Option<&[Policy]> {
        self.ballot_policies.get(&ballot).map(Vec::as_slice)
    }

    /// Adoption records (phase 2b) for a ballot.
    pub fn adoptions_for(&self, ballot: BallotId) -> Option<&Votes<Configuration>> {
        self.phase2b_votes.get(&ballot)
    }

    fn open_ballot(&mut self, reason: &'static str) -> Vec<Action> {
        self.ballot = self.ballot.next();
        let fixed = self.pending.clone();
        info!(
            at = ?self.now,
            ballot = %self.ballot,
            policies = fixed.len(),
            reason,
            "opening ballot"
        );
        self.ballot_policies.insert(self.ballot, fixed);
        self.phase1b_votes = Votes::new(
            self.config
                .variant
                .ballot_quorum(self.config.members.acceptors),
        );
        self.announced = false;
        vec![Action::Broadcast {
            role: Role::Acceptor,
            message: ProtocolMessage::Phase1a {
                ballot: self.ballot,
            },
        }]
    }

    fn on_phase1b(
        &mut self,
        acceptor: AcceptorId,
        ballot: BallotId,
        cstruct: Configuration,
    ) -> Vec<Action> {
        if ballot != self.ballot {
            trace!(heard = %ballot, current = %self.ballot, "ignoring stale phase1b");
            return Vec::new();
        }
        self.phase1b_votes.insert(acceptor, cstruct);
        if self.announced || !self.phase1b_votes.is_quorum() {
            return Vec::new();
        }
        self.announce()
    }

    /// A promise quorum is in: combine, extend with this ballot's
    /// policies, and broadcast phase 2a.
    fn announce(&mut self) -> Vec<Action> {
        // Combine at classic majority in both variants. A fast quorum of
        // promises intersects every fast quorum in a classic majority, so
        // counting support at the classic threshold is exactly what keeps
        // fast-learned acceptances in the extension.
        let votes = self.phase1b_votes.with_family(
            self.config
                .variant
                .combination_quorum(self.config.members.acceptors),
        );
        let base = match combination(&votes) {
            Ok(base) => base,
            Err(err) => {
                warn!(ballot = %self.ballot, %err, "promise quorum combined contradictorily");
                return vec![Action::ReportViolation {
                    violation: ProtocolViolation::ContradictoryCombination {
                        observer: Address::new(Role::Leader, 0),
                    },
                }];
            }
        };

        // The extension must cover everything the whole promise set agrees
        // on: the combination of a quorum always extends the lub of its
        // votes, checked here so a regression surfaces as a violation
        // instead of acceptor-side drops.
        let mut actions = Vec::new();
        if let Some(lub) = self
            .phase1b_votes
            .iter()
            .map(|(_, cstruct)| cstruct.clone())
            .reduce(|a, b| a.lub(&b))
        {
            if !base.extends(&lub) {
                warn!(ballot = %self.ballot, "phase2a does not cover the promise lub");
                actions.push(Action::ReportViolation {
                    violation: ProtocolViolation::NonCoveringPhase2a {
                        ballot: self.ballot,
                    },
                });
            }
        }

        let fixed = self
            .ballot_policies
            .get(&self.ballot)
            .cloned()
            .unwrap_or_default();
        let mut extension = base;
        for policy in &fixed {
            let (decided, next) = extension.accept_or_reject(policy.clone());
            debug!(ballot = %self.ballot, outcome = %decided, "decided policy");
            extension = next;
        }

        // Everything fixed for this ballot is now decided; drop it from
        // the pending queue. Proposals that arrived after phase 1a are not
        // in `fixed` and stay for the next ballot.
        self.pending.retain(|p| !fixed.contains(p));
        self.announced = true;

        info!(
            ballot = %self.ballot,
            extension_len = extension.len(),
            "announcing phase2a"
        );
        actions.push(Action::Broadcast {
            role: Role::Acceptor,
            message: ProtocolMessage::Phase2a {
                ballot: self.ballot,
                cstruct: extension,
            },
        });
        actions
    }

    fn on_phase2b(
        &mut self,
        acceptor: AcceptorId,
        ballot: BallotId,
        cstruct: Configuration,
    ) -> Vec<Action> {
        let acceptors = self.config.members.acceptors;
        self.phase2b_votes
            .entry(ballot)
            .or_insert_with(|| Votes::new(self.config.variant.ballot_quorum(acceptors)))
            .insert(acceptor, cstruct.clone());

        if !self.config.variant.is_fast() {
            return Vec::new();
        }

        // Fast variant: every announcement feeds divergence detection.
        self.fast_votes.insert(acceptor, cstruct);
        if !self.recovery_pending && self.fast_path_diverged() {
            warn!(
                heard = self.fast_votes.len(),
                delay = ?self.config.recovery_delay,
                "fast path diverged, scheduling recovery ballot"
            );
            self.recovery_pending = true;
            return vec![Action::SetTimer {
                id: TimerId::Recovery,
                duration: self.config.recovery_delay,
            }];
        }
        Vec::new()
    }

    /// Whether the fast path can no longer decide some policy by itself.
    ///
    /// True when the heard cstructs combine contradictorily, or when some
    /// policy's supporters within the heard set no longer sub-intersect
    /// any fast quorum in either direction: even with every unheard
    /// acceptor agreeing, neither the acceptance nor the rejection can be
    /// chosen.
    fn fast_path_diverged(&self) -> bool {
        if combination(&self.fast_votes).is_err() {
            return true;
        }

        let family = self.fast_votes.family();
        let heard = self.fast_votes.len();
        let mut policies: Vec<&Policy> = self
            .fast_votes
            .iter()
            .flat_map(|(_, cstruct)| cstruct.iter().map(|acc| acc.command()))
            .collect();
        policies.sort();
        policies.dedup();

        for policy in policies {
            let accepted = self.support(policy, true);
            let rejected = self.support(policy, false);
            if !family.intersects_quorum(heard, accepted)
                && !family.intersects_quorum(heard, rejected)
            {
                return true;
            }
        }
        false
    }

    fn support(&self, policy: &Policy, accepted: bool) -> usize {
        use gpaxos_types::Acceptance;
        let needle = if accepted {
            Acceptance::Accepted(policy.clone())
        } else {
            Acceptance::Rejected(policy.clone())
        };
        self.fast_votes
            .iter()
            .filter(|(_, cstruct)| cstruct.contains_acceptance(&needle))
            .count()
    }
}

impl StateMachine for LeaderState {
    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::ProposalReceived { policy } => {
                debug!(%policy, "queued proposal");
                self.pending.push(policy);
                Vec::new()
            }

            Event::BallotTimer => self.open_ballot("schedule"),

            Event::RecoveryTimer => {
                self.recovery_pending = false;
                self.fast_votes = Votes::new(
                    self.config
                        .variant
                        .learner_quorum(self.config.members.acceptors),
                );
                self.open_ballot("fast-path recovery")
            }

            Event::Phase1bReceived {
                acceptor,
                ballot,
                cstruct,
            } => self.on_phase1b(acceptor, ballot, cstruct),

            Event::Phase2bReceived {
                acceptor,
                ballot,
                cstruct,
            } => self.on_phase2b(acceptor, ballot, cstruct),

            other => {
                trace!(event = other.type_name(), "ignoring event not addressed to the leader");
                Vec::new()
            }
        }
    }
}
