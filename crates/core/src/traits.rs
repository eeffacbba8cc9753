//! The state machine trait implemented by every role.

use crate::{Action, Event};
use std::time::Duration;

/// A synchronous, deterministic role state machine.
///
/// The runner serializes calls per instance: at most one `handle` runs at
/// a time, so each state transition is an atomic step. Handlers must not
/// leave partial updates behind on error paths; compute first, commit
/// last.
pub trait StateMachine {
    /// Update the machine's view of the current time. Called by the
    /// runner before each `handle`.
    fn set_time(&mut self, now: Duration);

    /// Process one event and return the actions to perform.
    fn handle(&mut self, event: Event) -> Vec<Action>;
}
