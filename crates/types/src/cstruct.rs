//! CStructs: partially-ordered, conflict-free collections of decided commands.
//!
//! A cstruct records, per command, whether the system accepted or rejected
//! it. The set is kept non-contradictory: no two entries may conflict.
//! Rejections never conflict with anything, so rejecting is always possible;
//! this is what makes [`CStruct::accept_or_reject`] total.
//!
//! The partial order on cstructs is superset inclusion (`extends`). Under
//! that order the lattice operations are union-with-conflict-check (`glb`)
//! and intersection (`lub`).

use crate::policy::{Command, Policy};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// The decided outcome for a single command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Acceptance<C> {
    /// The command was accepted into the replicated state.
    Accepted(C),
    /// The command conflicted with the state at decision time.
    Rejected(C),
}

impl<C> Acceptance<C> {
    /// The command under the acceptance tag.
    pub fn command(&self) -> &C {
        match self {
            Acceptance::Accepted(c) | Acceptance::Rejected(c) => c,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Acceptance::Accepted(_))
    }

    fn tag_rank(&self) -> u8 {
        match self {
            Acceptance::Accepted(_) => 0,
            Acceptance::Rejected(_) => 1,
        }
    }
}

impl<C: Command> Acceptance<C> {
    /// Rejections never conflict; two acceptances conflict iff their
    /// commands do.
    pub fn conflicts(&self, other: &Acceptance<C>) -> bool {
        match (self, other) {
            (Acceptance::Accepted(a), Acceptance::Accepted(b)) => a.conflicts(b),
            _ => false,
        }
    }
}

// Ordered by (command identity, acceptance tag) so a cstruct's entry set
// has one canonical layout per run.
impl<C: Ord> Ord for Acceptance<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.command()
            .cmp(other.command())
            .then_with(|| self.tag_rank().cmp(&other.tag_rank()))
    }
}

impl<C: Ord> PartialOrd for Acceptance<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: std::fmt::Display> std::fmt::Display for Acceptance<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Acceptance::Accepted(c) => write!(f, "+{c}"),
            Acceptance::Rejected(c) => write!(f, "-{c}"),
        }
    }
}

/// Errors from cstruct mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CStructError {
    /// The acceptance conflicts with an entry already in the cstruct.
    #[error("acceptance conflicts with the existing cstruct")]
    Conflict,
}

/// A non-contradictory set of acceptances.
///
/// All mutating operations are copy-on-write: they return a new cstruct and
/// leave the receiver untouched, so a failed extension can never make a
/// partial update visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CStruct<C: Command> {
    entries: BTreeSet<Acceptance<C>>,
}

/// The cstruct instance replicated in this system.
pub type Configuration = CStruct<Policy>;

impl<C: Command> Default for CStruct<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Command> CStruct<C> {
    /// The empty cstruct (bottom of the lattice).
    pub fn new() -> Self {
        Self {
            entries: BTreeSet::new(),
        }
    }

    /// Build a cstruct from entries, failing if any pair conflicts.
    pub fn try_from_entries<I>(entries: I) -> Result<Self, CStructError>
    where
        I: IntoIterator<Item = Acceptance<C>>,
    {
        let mut out = Self::new();
        for acc in entries {
            out = out.add(acc)?;
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Acceptance<C>> {
        self.entries.iter()
    }

    /// Commands accepted by this cstruct.
    pub fn accepted(&self) -> impl Iterator<Item = &C> {
        self.entries.iter().filter_map(|a| match a {
            Acceptance::Accepted(c) => Some(c),
            Acceptance::Rejected(_) => None,
        })
    }

    /// Whether this exact acceptance is present.
    pub fn contains_acceptance(&self, acc: &Acceptance<C>) -> bool {
        self.entries.contains(acc)
    }

    /// Whether the command was decided either way.
    pub fn contains(&self, command: &C) -> bool {
        self.entries
            .contains(&Acceptance::Accepted(command.clone()))
            || self
                .entries
                .contains(&Acceptance::Rejected(command.clone()))
    }

    /// `self` extends `other` iff `self ⊇ other`.
    pub fn extends(&self, other: &Self) -> bool {
        other.entries.is_subset(&self.entries)
    }

    /// Add one acceptance. An accepted command must agree with every
    /// command already accepted; rejections always fit.
    pub fn add(&self, acc: Acceptance<C>) -> Result<Self, CStructError> {
        let fits = match &acc {
            Acceptance::Rejected(_) => true,
            Acceptance::Accepted(command) => {
                self.accepted().all(|existing| existing.agrees(command))
            }
        };
        if !fits {
            return Err(CStructError::Conflict);
        }
        let mut entries = self.entries.clone();
        entries.insert(acc);
        Ok(Self { entries })
    }

    /// Decide a command against this cstruct. Total: a command that cannot
    /// be accepted is rejected, and rejections always fit.
    pub fn accept_or_reject(&self, command: C) -> (Acceptance<C>, Self) {
        match self.add(Acceptance::Accepted(command.clone())) {
            Ok(next) => (Acceptance::Accepted(command), next),
            Err(CStructError::Conflict) => {
                let acc = Acceptance::Rejected(command);
                let mut entries = self.entries.clone();
                entries.insert(acc.clone());
                (acc, Self { entries })
            }
        }
    }

    /// Greatest lower bound: union, failing if the result is contradictory.
    pub fn glb(&self, other: &Self) -> Result<Self, CStructError> {
        let merged = Self {
            entries: self.entries.union(&other.entries).cloned().collect(),
        };
        if merged.is_contradictory() {
            return Err(CStructError::Conflict);
        }
        Ok(merged)
    }

    /// Least upper bound: intersection. Always defined.
    pub fn lub(&self, other: &Self) -> Self {
        Self {
            entries: self.entries.intersection(&other.entries).cloned().collect(),
        }
    }

    /// Entries in `self` that are not in `other`, in canonical order.
    pub fn difference(&self, other: &Self) -> Vec<Acceptance<C>> {
        self.entries.difference(&other.entries).cloned().collect()
    }

    /// Whether any pair of entries conflicts. Cstructs built through the
    /// checked operations never are; this exists to validate foreign input.
    pub fn is_contradictory(&self) -> bool {
        let entries: Vec<_> = self.entries.iter().collect();
        for (i, a) in entries.iter().enumerate() {
            for b in &entries[i + 1..] {
                if a.conflicts(b) {
                    return true;
                }
            }
        }
        false
    }
}

impl<C: Command + std::fmt::Display> std::fmt::Display for CStruct<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, acc) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{acc}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good(name: &str) -> Policy {
        Policy::Good(name.into())
    }

    fn bad(name: &str) -> Policy {
        Policy::Bad(name.into())
    }

    #[test]
    fn add_agreed_command() {
        let s = Configuration::new();
        let s = s.add(Acceptance::Accepted(good("p1"))).unwrap();
        let s = s.add(Acceptance::Accepted(good("p2"))).unwrap();
        assert_eq!(s.len(), 2);
        assert!(s.contains(&good("p1")));
    }

    #[test]
    fn add_conflicting_command_fails() {
        let s = Configuration::try_from_entries([Acceptance::Accepted(bad("b1"))]).unwrap();
        assert_eq!(
            s.add(Acceptance::Accepted(bad("b2"))),
            Err(CStructError::Conflict)
        );
        // The receiver is untouched by the failed add.
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn rejection_always_fits() {
        let s = Configuration::try_from_entries([Acceptance::Accepted(bad("b1"))]).unwrap();
        let s = s.add(Acceptance::Rejected(bad("b2"))).unwrap();
        assert_eq!(s.len(), 2);
        assert!(!s.is_contradictory());
    }

    #[test]
    fn accept_or_reject_is_total() {
        let s = Configuration::new();
        let (first, s) = s.accept_or_reject(bad("b1"));
        assert!(first.is_accepted());
        let (second, s) = s.accept_or_reject(bad("b2"));
        assert!(!second.is_accepted());
        assert!(s.contains(&bad("b1")));
        assert!(s.contains(&bad("b2")));
    }

    #[test]
    fn extends_is_superset() {
        let small =
            Configuration::try_from_entries([Acceptance::Accepted(good("p1"))]).unwrap();
        let large = small.add(Acceptance::Accepted(good("p2"))).unwrap();
        assert!(large.extends(&small));
        assert!(!small.extends(&large));
        assert!(small.extends(&small));
        assert!(small.extends(&Configuration::new()));
    }

    #[test]
    fn glb_is_checked_union() {
        let a = Configuration::try_from_entries([Acceptance::Accepted(good("p1"))]).unwrap();
        let b = Configuration::try_from_entries([Acceptance::Accepted(good("p2"))]).unwrap();
        let merged = a.glb(&b).unwrap();
        assert_eq!(merged.len(), 2);

        let x = Configuration::try_from_entries([Acceptance::Accepted(bad("b1"))]).unwrap();
        let y = Configuration::try_from_entries([Acceptance::Accepted(bad("b2"))]).unwrap();
        assert_eq!(x.glb(&y), Err(CStructError::Conflict));
    }

    #[test]
    fn lub_is_intersection() {
        let a = Configuration::try_from_entries([
            Acceptance::Accepted(good("p1")),
            Acceptance::Accepted(good("p2")),
        ])
        .unwrap();
        let b = Configuration::try_from_entries([
            Acceptance::Accepted(good("p2")),
            Acceptance::Accepted(good("p3")),
        ])
        .unwrap();
        let common = a.lub(&b);
        assert_eq!(common.len(), 1);
        assert!(common.contains(&good("p2")));
    }

    #[test]
    fn accepted_and_rejected_of_same_command_coexist() {
        // A rejection conflicts with nothing, including the acceptance of
        // the same command. Combination ties rely on this being well-formed.
        let s = Configuration::try_from_entries([
            Acceptance::Accepted(good("p")),
            Acceptance::Rejected(good("p")),
        ])
        .unwrap();
        assert_eq!(s.len(), 2);
        assert!(!s.is_contradictory());
    }
}
