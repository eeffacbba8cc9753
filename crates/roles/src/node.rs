//! Uniform wrapper over the four role state machines.

use crate::{AcceptorState, LeaderState, LearnerState, ProposerState};
use gpaxos_core::{Action, Event, Role, StateMachine};
use std::time::Duration;

/// One node of a running topology: exactly one role instance.
///
/// The runner holds a vector of these and dispatches events without
/// caring which role lives at an index.
#[derive(Debug, Clone)]
pub enum RoleStateMachine {
    Proposer(ProposerState),
    Leader(LeaderState),
    Acceptor(AcceptorState),
    Learner(LearnerState),
}

impl RoleStateMachine {
    pub fn role(&self) -> Role {
        match self {
            RoleStateMachine::Proposer(_) => Role::Proposer,
            RoleStateMachine::Leader(_) => Role::Leader,
            RoleStateMachine::Acceptor(_) => Role::Acceptor,
            RoleStateMachine::Learner(_) => Role::Learner,
        }
    }

    pub fn as_proposer(&self) -> Option<&ProposerState> {
        match self {
            RoleStateMachine::Proposer(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_leader(&self) -> Option<&LeaderState> {
        match self {
            RoleStateMachine::Leader(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_acceptor(&self) -> Option<&AcceptorState> {
        match self {
            RoleStateMachine::Acceptor(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_learner(&self) -> Option<&LearnerState> {
        match self {
            RoleStateMachine::Learner(state) => Some(state),
            _ => None,
        }
    }
}

impl StateMachine for RoleStateMachine {
    fn set_time(&mut self, now: Duration) {
        match self {
            RoleStateMachine::Proposer(state) => state.set_time(now),
            RoleStateMachine::Leader(state) => state.set_time(now),
            RoleStateMachine::Acceptor(state) => state.set_time(now),
            RoleStateMachine::Learner(state) => state.set_time(now),
        }
    }

    fn handle(&mut self, event: Event) -> Vec<Action> {
        match self {
            RoleStateMachine::Proposer(state) => state.handle(event),
            RoleStateMachine::Leader(state) => state.handle(event),
            RoleStateMachine::Acceptor(state) => state.handle(event),
            RoleStateMachine::Learner(state) => state.handle(event),
        }
    }
}
