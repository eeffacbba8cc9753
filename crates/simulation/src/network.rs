//! Simulated network with deterministic, per-address delay profiles.
//!
//! A [`DelayProfile`] is an ordered rule list: the first rule matching the
//! destination address and the current instant decides the fate of a
//! message (constant delay, a uniformly drawn delay, or a blackout drop).
//! Temporally-scoped composition falls out of the rule windows: a blackout
//! rule for `[5s, 20s)` in front of a constant default models exactly a
//! temporary outage.

use gpaxos_core::{Address, Role};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// Which destination addresses a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFilter {
    /// Every address.
    Any,
    /// Every instance of one role.
    Role(Role),
    /// One role instance.
    Exact(Address),
}

impl AddressFilter {
    pub fn matches(&self, address: &Address) -> bool {
        match self {
            AddressFilter::Any => true,
            AddressFilter::Role(role) => address.role == *role,
            AddressFilter::Exact(exact) => address == exact,
        }
    }
}

/// What happens to a matched message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayKind {
    /// Delivered after a fixed delay.
    Constant(Duration),
    /// Delivered after a delay drawn uniformly from `[low, high]`.
    Uniform { low: Duration, high: Duration },
    /// Dropped.
    Blackout,
}

impl DelayKind {
    fn sample(&self, rng: &mut ChaCha8Rng) -> Option<Duration> {
        match self {
            DelayKind::Constant(delay) => Some(*delay),
            DelayKind::Uniform { low, high } => {
                if high <= low {
                    return Some(*low);
                }
                let secs = rng.gen_range(low.as_secs_f64()..=high.as_secs_f64());
                Some(Duration::from_secs_f64(secs))
            }
            DelayKind::Blackout => None,
        }
    }
}

/// One delay rule: filter, optional activity window, behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRule {
    pub applies_to: AddressFilter,
    /// Half-open activity window `[from, until)`; `None` means always.
    pub window: Option<(Duration, Duration)>,
    pub kind: DelayKind,
}

impl DelayRule {
    fn active(&self, now: Duration) -> bool {
        match self.window {
            None => true,
            Some((from, until)) => now >= from && now < until,
        }
    }
}

/// Ordered delay rules with a default. First match wins.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayProfile {
    rules: Vec<DelayRule>,
    default: DelayKind,
}

impl Default for DelayProfile {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default: DelayKind::Constant(Duration::from_millis(10)),
        }
    }
}

impl DelayProfile {
    pub fn new(default: DelayKind) -> Self {
        Self {
            rules: Vec::new(),
            default,
        }
    }

    pub fn with_rule(mut self, rule: DelayRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Permanent blackout of one address.
    pub fn with_blackout(self, address: Address) -> Self {
        self.with_rule(DelayRule {
            applies_to: AddressFilter::Exact(address),
            window: None,
            kind: DelayKind::Blackout,
        })
    }

    /// Blackout of one address during `[from, until)`.
    pub fn with_blackout_window(self, address: Address, from: Duration, until: Duration) -> Self {
        self.with_rule(DelayRule {
            applies_to: AddressFilter::Exact(address),
            window: Some((from, until)),
            kind: DelayKind::Blackout,
        })
    }

    /// The delay for a message to `to` sent at `now`, or `None` when the
    /// message is dropped.
    pub fn delay_to(
        &self,
        to: &Address,
        now: Duration,
        rng: &mut ChaCha8Rng,
    ) -> Option<Duration> {
        let kind = self
            .rules
            .iter()
            .find(|rule| rule.active(now) && rule.applies_to.matches(to))
            .map(|rule| rule.kind)
            .unwrap_or(self.default);
        kind.sample(rng)
    }
}

/// Simulated network for deterministic message delivery.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    profile: DelayProfile,
}

impl SimulatedNetwork {
    pub fn new(profile: DelayProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &DelayProfile {
        &self.profile
    }

    /// Replace the delay profile mid-run (fault injection).
    pub fn set_profile(&mut self, profile: DelayProfile) {
        self.profile = profile;
    }

    /// Determine if a message should be delivered to `to` at `now`.
    /// Returns `None` if it is dropped, `Some(latency)` otherwise.
    pub fn should_deliver(
        &self,
        to: &Address,
        now: Duration,
        rng: &mut ChaCha8Rng,
    ) -> Option<Duration> {
        self.profile.delay_to(to, now, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn acceptor(index: u32) -> Address {
        Address::new(Role::Acceptor, index)
    }

    #[test]
    fn default_profile_delivers_everything() {
        let network = SimulatedNetwork::new(DelayProfile::default());
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for index in 0..3 {
            assert_eq!(
                network.should_deliver(&acceptor(index), Duration::ZERO, &mut rng),
                Some(Duration::from_millis(10))
            );
        }
    }

    #[test]
    fn blackout_drops_only_the_target() {
        let profile = DelayProfile::default().with_blackout(acceptor(1));
        let network = SimulatedNetwork::new(profile);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        assert!(network
            .should_deliver(&acceptor(1), Duration::ZERO, &mut rng)
            .is_none());
        assert!(network
            .should_deliver(&acceptor(2), Duration::ZERO, &mut rng)
            .is_some());
    }

    #[test]
    fn windowed_blackout_heals() {
        let profile = DelayProfile::default().with_blackout_window(
            acceptor(1),
            Duration::from_secs(5),
            Duration::from_secs(20),
        );
        let network = SimulatedNetwork::new(profile);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        assert!(network
            .should_deliver(&acceptor(1), Duration::from_secs(4), &mut rng)
            .is_some());
        assert!(network
            .should_deliver(&acceptor(1), Duration::from_secs(5), &mut rng)
            .is_none());
        assert!(network
            .should_deliver(&acceptor(1), Duration::from_secs(19), &mut rng)
            .is_none());
        assert!(network
            .should_deliver(&acceptor(1), Duration::from_secs(20), &mut rng)
            .is_some());
    }

    #[test]
    fn first_matching_rule_wins() {
        let profile = DelayProfile::new(DelayKind::Constant(Duration::from_millis(10)))
            .with_rule(DelayRule {
                applies_to: AddressFilter::Role(Role::Acceptor),
                window: None,
                kind: DelayKind::Constant(Duration::from_millis(100)),
            })
            .with_blackout(acceptor(1));
        let network = SimulatedNetwork::new(profile);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        // The role-wide rule shadows the later exact blackout.
        assert_eq!(
            network.should_deliver(&acceptor(1), Duration::ZERO, &mut rng),
            Some(Duration::from_millis(100))
        );
        // Non-acceptors fall through to the default.
        assert_eq!(
            network.should_deliver(&Address::new(Role::Learner, 0), Duration::ZERO, &mut rng),
            Some(Duration::from_millis(10))
        );
    }

    #[test]
    fn uniform_delay_is_deterministic_per_seed() {
        let profile = DelayProfile::new(DelayKind::Uniform {
            low: Duration::from_millis(5),
            high: Duration::from_millis(50),
        });
        let network = SimulatedNetwork::new(profile);

        let mut rng1 = ChaCha8Rng::seed_from_u64(7);
        let mut rng2 = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..32 {
            let a = network.should_deliver(&acceptor(0), Duration::ZERO, &mut rng1);
            let b = network.should_deliver(&acceptor(0), Duration::ZERO, &mut rng2);
            assert_eq!(a, b, "same seed should produce same delay");
            let delay = a.expect("uniform kind never drops");
            assert!(delay >= Duration::from_millis(5) && delay <= Duration::from_millis(50));
        }
    }
}
