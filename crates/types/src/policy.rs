//! The command domain replicated by the protocol.
//!
//! The protocol core is generic over the command type; all it requires is
//! the symmetric conflict relation expressed by [`Command`]. The [`Policy`]
//! enum is the concrete domain used by the simulator and the test suite:
//! its three shapes cover the interesting corners of the relation
//! (conflict-free, all-conflicting, group-wise conflicting).

use serde::{Deserialize, Serialize};

/// A replicable command with a conflict relation.
///
/// The relation must be symmetric and irreflexive: every command agrees
/// with itself.
pub trait Command: Clone + Ord + std::fmt::Debug {
    /// Whether two commands cannot coexist in one accepted set.
    fn conflicts(&self, other: &Self) -> bool;

    /// Negation of [`Command::conflicts`].
    fn agrees(&self, other: &Self) -> bool {
        !self.conflicts(other)
    }
}

/// A named policy with a configurable temperament.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Policy {
    /// Agrees with every policy.
    Good(String),
    /// Conflicts with every policy except itself.
    Bad(String),
    /// Conflicts exactly with other policies of the same group.
    Moody {
        /// Conflict group. Two distinct moody policies conflict iff their
        /// groups are equal.
        group: u32,
        /// Policy name.
        name: String,
    },
}

impl Policy {
    /// The policy's name, ignoring its temperament.
    pub fn name(&self) -> &str {
        match self {
            Policy::Good(name) | Policy::Bad(name) => name,
            Policy::Moody { name, .. } => name,
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Good(name) => write!(f, "good:{name}"),
            Policy::Bad(name) => write!(f, "bad:{name}"),
            Policy::Moody { group, name } => write!(f, "moody[{group}]:{name}"),
        }
    }
}

impl Command for Policy {
    fn conflicts(&self, other: &Self) -> bool {
        // Reflexive agreement takes precedence over temperament.
        if self == other {
            return false;
        }
        match (self, other) {
            (Policy::Bad(_), _) | (_, Policy::Bad(_)) => true,
            (Policy::Moody { group: a, .. }, Policy::Moody { group: b, .. }) => a == b,
            _ => false,
        }
    }
}
