//! Combination: reconciling a set of acceptor cstructs into one.
//!
//! The combined cstruct contains exactly the acceptances supported by some
//! minimum quorum of the voters. Two formulations are provided:
//!
//! 1. [`combination`]: for each acceptance present in any vote, count the
//!    voters whose cstruct extends it and include it when they form a
//!    quorum. This is the one the protocol runs.
//! 2. [`combination_by_quorums`]: enumerate the minimum quorums of the vote
//!    set, take the `lub` (intersection) across each quorum's votes, then
//!    the `glb` (checked union) of the results. Exponential, kept as the
//!    executable reference definition.
//!
//! Both yield the same output on well-formed input; a test pins that. Ties
//! where both `Accepted(p)` and `Rejected(p)` reach quorum are included as
//! both entries (a rejection conflicts with nothing), identically in both
//! formulations since the per-acceptance checks are independent.

use crate::cstruct::{Acceptance, CStruct};
use crate::policy::Command;
use crate::votes::Votes;
use std::collections::BTreeSet;

/// Errors from combining votes.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CombinationError {
    /// Quorum-supported acceptances conflict with each other. On honest
    /// input this means the vote set has diverged (fast-path conflict).
    #[error("combined cstruct is contradictory")]
    Contradictory,
}

/// Per-acceptance quorum counting.
pub fn combination<C: Command>(
    votes: &Votes<CStruct<C>>,
) -> Result<CStruct<C>, CombinationError> {
    let mut candidates: BTreeSet<&Acceptance<C>> = BTreeSet::new();
    for (_, cstruct) in votes.iter() {
        candidates.extend(cstruct.iter());
    }

    let mut supported = Vec::new();
    for acc in candidates {
        let supporters = votes
            .iter()
            .filter(|(_, cstruct)| cstruct.contains_acceptance(acc))
            .count();
        if votes.family().is_quorum(supporters) {
            supported.push(acc.clone());
        }
    }

    CStruct::try_from_entries(supported).map_err(|_| CombinationError::Contradictory)
}

/// Minimum-quorum enumeration: glb over per-quorum lubs.
pub fn combination_by_quorums<C: Command>(
    votes: &Votes<CStruct<C>>,
) -> Result<CStruct<C>, CombinationError> {
    let mut combined: Option<CStruct<C>> = None;
    for quorum in votes.all_min_quorums() {
        let mut common: Option<CStruct<C>> = None;
        for (_, cstruct) in quorum.iter() {
            common = Some(match common {
                None => cstruct.clone(),
                Some(prev) => prev.lub(cstruct),
            });
        }
        if let Some(common) = common {
            combined = Some(match combined {
                None => common,
                Some(prev) => prev.glb(&common).map_err(|_| CombinationError::Contradictory)?,
            });
        }
    }
    Ok(combined.unwrap_or_default())
}
