//! Quorum size arithmetic for parameterized majority families.
//!
//! This is small but it is exactly the kind of fiddly threshold arithmetic
//! that is easy to get wrong, so it is kept in integer math and pinned by
//! table tests. A family is a fraction `num/den` of the acceptor count:
//! a vote set is a quorum when `|v| > N * num/den`, computed exactly as
//! `|v| * den > N * num`.
//!
//! The classic family uses 1/2; the fast family uses 3/4. Any two 3/4
//! quorums intersect in a classic majority, which is the property the fast
//! path's recovery safety rests on.

/// A majority quorum family over a fixed acceptor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MajorityFamily {
    num: u32,
    den: u32,
    acceptors: usize,
}

impl MajorityFamily {
    /// A family with threshold fraction `num/den` over `acceptors` members.
    pub fn new(num: u32, den: u32, acceptors: usize) -> Self {
        debug_assert!(den > 0 && num < den);
        Self {
            num,
            den,
            acceptors,
        }
    }

    /// Classic majority: strictly more than half.
    pub fn classic(acceptors: usize) -> Self {
        Self::new(1, 2, acceptors)
    }

    /// Fast majority: strictly more than three quarters.
    pub fn fast(acceptors: usize) -> Self {
        Self::new(3, 4, acceptors)
    }

    /// `|v| > N * frac`.
    pub fn is_quorum(&self, size: usize) -> bool {
        size * self.den as usize > self.acceptors * self.num as usize
    }

    /// A quorum that stops being one when any single vote is dropped.
    pub fn is_min_quorum(&self, size: usize) -> bool {
        size > 0 && self.is_quorum(size) && !self.is_quorum(size - 1)
    }

    /// The smallest quorum size.
    pub fn min_quorum_size(&self) -> usize {
        self.acceptors * self.num as usize / self.den as usize + 1
    }

    /// Whether `votes_size` supporters inside a heard set of `quorum_size`
    /// can still be the heard part of some full quorum, i.e.
    /// `|v| > |q| + N * (frac - 1)`.
    ///
    /// Derived from the intersection bound `|q ∩ r| >= |q| + |r| - N`:
    /// equivalently, the supporters plus every unheard acceptor would
    /// form a quorum. This is the divergence test for fast-path conflict
    /// recovery.
    pub fn intersects_quorum(&self, quorum_size: usize, votes_size: usize) -> bool {
        let den = self.den as i64;
        let num = self.num as i64;
        (votes_size as i64) * den > (quorum_size as i64) * den + self.acceptors as i64 * (num - den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Classic and fast thresholds, reformulated by replica count:
    //
    //  replicas `n` | classic `n/2 + 1` | fast `3n/4 + 1` |
    //  -------------|-------------------|-----------------|
    //  1            |  1                |  1              |
    //  2            |  2                |  2              |
    //  3            |  2                |  3              |
    //  4            |  3                |  4              |
    //  5            |  3                |  4              |
    //  6            |  4                |  5              |
    //  7            |  4                |  6              |
    //  8            |  5                |  7              |
    //  9            |  5                |  7              |
    //  10           |  6                |  8              |
    #[test]
    fn min_quorum_size_tables() {
        let classic = [1, 2, 2, 3, 3, 4, 4, 5, 5, 6];
        let fast = [1, 2, 3, 4, 4, 5, 6, 7, 7, 8];
        for n in 1..=10usize {
            assert_eq!(
                MajorityFamily::classic(n).min_quorum_size(),
                classic[n - 1],
                "classic n={n}"
            );
            assert_eq!(
                MajorityFamily::fast(n).min_quorum_size(),
                fast[n - 1],
                "fast n={n}"
            );
        }
    }

    #[test]
    fn quorum_predicate_matches_min_size() {
        for n in 1..=10usize {
            for family in [MajorityFamily::classic(n), MajorityFamily::fast(n)] {
                let min = family.min_quorum_size();
                for size in 0..=n {
                    assert_eq!(family.is_quorum(size), size >= min);
                    assert_eq!(family.is_min_quorum(size), size == min);
                }
            }
        }
    }

    #[test]
    fn quorum_is_monotone_in_size() {
        for n in 1..=10usize {
            let family = MajorityFamily::fast(n);
            for size in 1..=n {
                if family.is_quorum(size - 1) {
                    assert!(family.is_quorum(size));
                }
            }
        }
    }

    #[test]
    fn fast_quorums_intersect_in_classic_majority() {
        // |q ∩ r| >= 2 * min_fast - n must exceed n/2 for all n.
        for n in 1..=20usize {
            let fast = MajorityFamily::fast(n);
            let classic = MajorityFamily::classic(n);
            let min = fast.min_quorum_size();
            let overlap = 2 * min - n;
            assert!(
                classic.is_quorum(overlap),
                "n={n}: two fast quorums overlap in {overlap}, not a majority"
            );
        }
    }

    #[test]
    fn intersects_quorum_bound() {
        // With n=4 classic: a quorum of 3 and a vote set of 2 must overlap
        // (3 + 2 - 4 = 1 > 0), while a vote set of 1 need not.
        let family = MajorityFamily::classic(4);
        assert!(family.intersects_quorum(3, 2));
        assert!(!family.intersects_quorum(3, 1));
    }

    #[test]
    fn intersects_quorum_matches_reachability() {
        // Supporters inside a heard set sub-intersect a quorum exactly
        // when they would form one together with every unheard acceptor.
        for n in 1..=8usize {
            for family in [MajorityFamily::classic(n), MajorityFamily::fast(n)] {
                for heard in 0..=n {
                    for support in 0..=heard {
                        assert_eq!(
                            family.intersects_quorum(heard, support),
                            family.is_quorum(support + n - heard),
                            "n={n} heard={heard} support={support}"
                        );
                    }
                }
            }
        }
    }
}
