//! Deterministic ordering for the global event queue.

use crate::NodeIndex;
use gpaxos_core::{Event, EventPriority};
use std::time::Duration;

/// Total order over queued events.
///
/// Events are processed by time, then priority (internal before timers
/// before network before client), then receiving node, then insertion
/// sequence. The sequence makes the order total, which is what makes the
/// whole simulation replayable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    pub time: Duration,
    pub priority: EventPriority,
    pub node: NodeIndex,
    pub seq: u64,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, node: NodeIndex, seq: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            node,
            seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_dominates_ordering() {
        let early = EventKey::new(Duration::from_secs(1), &Event::BallotTimer, 9, 9);
        let late = EventKey::new(Duration::from_secs(2), &Event::BallotTimer, 0, 0);
        assert!(early < late);
    }

    #[test]
    fn timers_run_before_client_input_at_same_instant() {
        let timer = EventKey::new(Duration::from_secs(1), &Event::BallotTimer, 5, 10);
        let client = EventKey::new(
            Duration::from_secs(1),
            &Event::ProposeCommand {
                policy: gpaxos_types::Policy::Good("p".into()),
            },
            0,
            0,
        );
        assert!(timer < client);
    }
}
