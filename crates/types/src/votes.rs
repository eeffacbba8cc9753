//! Vote containers tagged by their quorum family.
//!
//! The source of truth for "is this set of votes a quorum" is the
//! [`MajorityFamily`] carried inside the container, so classic and fast
//! vote sets cannot be confused even though they share one type.

use crate::quorum::MajorityFamily;
use crate::AcceptorId;
use std::collections::BTreeMap;

/// A mapping from acceptor identity to that acceptor's vote.
///
/// Inserting for an acceptor that already voted replaces the previous vote
/// (latest wins); an acceptor's vote grows monotonically in this protocol
/// so the latest is always the most informed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Votes<V> {
    family: MajorityFamily,
    entries: BTreeMap<AcceptorId, V>,
}

impl<V: Clone> Votes<V> {
    pub fn new(family: MajorityFamily) -> Self {
        Self {
            family,
            entries: BTreeMap::new(),
        }
    }

    pub fn family(&self) -> MajorityFamily {
        self.family
    }

    pub fn insert(&mut self, acceptor: AcceptorId, vote: V) {
        self.entries.insert(acceptor, vote);
    }

    pub fn get(&self, acceptor: &AcceptorId) -> Option<&V> {
        self.entries.get(acceptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AcceptorId, &V)> {
        self.entries.iter()
    }

    pub fn acceptors(&self) -> impl Iterator<Item = AcceptorId> + '_ {
        self.entries.keys().copied()
    }

    /// Whether the voters form a quorum of the carried family.
    pub fn is_quorum(&self) -> bool {
        self.family.is_quorum(self.entries.len())
    }

    /// Whether the voters form a minimum quorum of the carried family.
    pub fn is_min_quorum(&self) -> bool {
        self.family.is_min_quorum(self.entries.len())
    }

    /// The same votes counted against a different quorum family.
    ///
    /// Fast-path recovery gathers promises from a fast quorum but combines
    /// them at classic majority, which is what lets every fast-learned
    /// acceptance survive into the recovery extension.
    pub fn with_family(&self, family: MajorityFamily) -> Votes<V> {
        Votes {
            family,
            entries: self.entries.clone(),
        }
    }

    /// The votes restricted to the given acceptors.
    pub fn restricted_to(&self, ids: &[AcceptorId]) -> Votes<V> {
        Votes {
            family: self.family,
            entries: self
                .entries
                .iter()
                .filter(|(id, _)| ids.contains(id))
                .map(|(id, v)| (*id, v.clone()))
                .collect(),
        }
    }

    /// All sub-vote-sets, the empty one included.
    ///
    /// Exponential in the voter count; the voter count is bounded by the
    /// acceptor set, which is small in every topology this system runs.
    pub fn sub_votes(&self) -> Vec<Votes<V>> {
        let keys: Vec<AcceptorId> = self.entries.keys().copied().collect();
        let mut out = Vec::with_capacity(1usize << keys.len());
        for mask in 0usize..(1usize << keys.len()) {
            let chosen: Vec<AcceptorId> = keys
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1usize << i) != 0)
                .map(|(_, id)| *id)
                .collect();
            out.push(self.restricted_to(&chosen));
        }
        out
    }

    /// All sub-vote-sets that are quorums.
    pub fn all_quorums(&self) -> Vec<Votes<V>> {
        self.sub_votes().into_iter().filter(Votes::is_quorum).collect()
    }

    /// All sub-vote-sets that are minimum quorums: the quorums that stop
    /// being quorums when any single vote is dropped.
    pub fn all_min_quorums(&self) -> Vec<Votes<V>> {
        self.all_quorums()
            .into_iter()
            .filter(Votes::is_min_quorum)
            .collect()
    }
}
