//! Property-based tests for the cstruct lattice and quorum laws.

use gpaxos_types::{
    combination, AcceptorId, Acceptance, CStruct, Configuration, MajorityFamily, Policy, Votes,
};
use proptest::prelude::*;

fn policy_strategy() -> impl Strategy<Value = Policy> {
    prop_oneof![
        "[a-e]".prop_map(Policy::Good),
        "[a-e]".prop_map(Policy::Bad),
        (0u32..3, "[a-e]").prop_map(|(group, name)| Policy::Moody { group, name }),
    ]
}

/// Build a well-formed cstruct by deciding a random command sequence.
fn cstruct_strategy() -> impl Strategy<Value = Configuration> {
    prop::collection::vec(policy_strategy(), 0..8).prop_map(|policies| {
        let mut cstruct = Configuration::new();
        for policy in policies {
            let (_, next) = cstruct.accept_or_reject(policy);
            cstruct = next;
        }
        cstruct
    })
}

fn votes_strategy(acceptors: usize) -> impl Strategy<Value = Votes<Configuration>> {
    prop::collection::vec(cstruct_strategy(), 1..=acceptors).prop_map(move |cstructs| {
        let mut votes = Votes::new(MajorityFamily::classic(acceptors));
        for (i, cstruct) in cstructs.into_iter().enumerate() {
            votes.insert(AcceptorId(i as u32 + 1), cstruct);
        }
        votes
    })
}

proptest! {
    #[test]
    fn glb_is_commutative(a in cstruct_strategy(), b in cstruct_strategy()) {
        prop_assert_eq!(a.glb(&b), b.glb(&a));
    }

    #[test]
    fn glb_is_associative(
        a in cstruct_strategy(),
        b in cstruct_strategy(),
        c in cstruct_strategy()
    ) {
        let left = a.glb(&b).and_then(|ab| ab.glb(&c));
        let right = b.glb(&c).and_then(|bc| a.glb(&bc));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn glb_is_idempotent(a in cstruct_strategy()) {
        prop_assert_eq!(a.glb(&a), Ok(a));
    }

    #[test]
    fn lub_is_commutative(a in cstruct_strategy(), b in cstruct_strategy()) {
        prop_assert_eq!(a.lub(&b), b.lub(&a));
    }

    #[test]
    fn lub_is_associative(
        a in cstruct_strategy(),
        b in cstruct_strategy(),
        c in cstruct_strategy()
    ) {
        prop_assert_eq!(a.lub(&b).lub(&c), a.lub(&b.lub(&c)));
    }

    #[test]
    fn lub_is_idempotent(a in cstruct_strategy()) {
        prop_assert_eq!(a.lub(&a), a);
    }

    #[test]
    fn extends_is_reflexive(a in cstruct_strategy()) {
        prop_assert!(a.extends(&a));
    }

    #[test]
    fn extends_is_transitive(
        a in cstruct_strategy(),
        policies in prop::collection::vec(policy_strategy(), 0..4)
    ) {
        // Grow a into b into c so the premise actually holds.
        let mut b = a.clone();
        for p in &policies {
            let (_, next) = b.accept_or_reject(p.clone());
            b = next;
        }
        let mut c = b.clone();
        for p in &policies {
            let (_, next) = c.accept_or_reject(Policy::Good(format!("t-{p}")));
            c = next;
        }
        prop_assert!(b.extends(&a));
        prop_assert!(c.extends(&b));
        prop_assert!(c.extends(&a));
    }

    #[test]
    fn extends_is_antisymmetric(a in cstruct_strategy(), b in cstruct_strategy()) {
        if a.extends(&b) && b.extends(&a) {
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn glb_extends_both_operands(a in cstruct_strategy(), b in cstruct_strategy()) {
        if let Ok(merged) = a.glb(&b) {
            prop_assert!(merged.extends(&a));
            prop_assert!(merged.extends(&b));
        }
    }

    #[test]
    fn both_operands_extend_lub(a in cstruct_strategy(), b in cstruct_strategy()) {
        let common = a.lub(&b);
        prop_assert!(a.extends(&common));
        prop_assert!(b.extends(&common));
    }

    #[test]
    fn accept_or_reject_never_contradicts(
        a in cstruct_strategy(),
        p in policy_strategy()
    ) {
        let (decided, next) = a.accept_or_reject(p.clone());
        prop_assert!(!next.is_contradictory());
        prop_assert!(next.extends(&a));
        prop_assert!(next.contains_acceptance(&decided));
    }

    #[test]
    fn is_quorum_is_monotone(n in 1usize..12, size in 0usize..12) {
        for family in [MajorityFamily::classic(n), MajorityFamily::fast(n)] {
            if family.is_quorum(size) {
                prop_assert!(family.is_quorum(size + 1));
            }
        }
    }

    #[test]
    fn combination_is_monotone_under_vote_addition(
        votes in votes_strategy(4),
        extra in cstruct_strategy()
    ) {
        let before = combination(&votes);
        let mut grown = votes.clone();
        // A brand-new voter only ever adds supporters.
        grown.insert(AcceptorId(9), extra);
        let after = combination(&grown);
        if let (Ok(before), Ok(after)) = (before, after) {
            prop_assert!(after.extends(&before));
        }
    }

    #[test]
    fn combined_output_is_never_contradictory(votes in votes_strategy(4)) {
        if let Ok(combined) = combination(&votes) {
            prop_assert!(!combined.is_contradictory());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Exponential reference formulation; fewer cases.
    #[test]
    fn combination_formulations_agree(votes in votes_strategy(4)) {
        prop_assert_eq!(
            combination(&votes),
            gpaxos_types::combination_by_quorums(&votes)
        );
    }
}

#[test]
fn acceptance_ordering_is_by_command_then_tag() {
    let a = Acceptance::Accepted(Policy::Good("a".into()));
    let r = Acceptance::Rejected(Policy::Good("a".into()));
    let b = Acceptance::Accepted(Policy::Good("b".into()));
    assert!(a < r);
    assert!(r < b);
}

#[test]
fn empty_cstruct_is_bottom() {
    let bottom = CStruct::<Policy>::new();
    let (_, grown) = bottom.accept_or_reject(Policy::Good("p".into()));
    assert!(grown.extends(&bottom));
    assert_eq!(grown.lub(&bottom), bottom);
    assert_eq!(grown.glb(&bottom), Ok(grown));
}
