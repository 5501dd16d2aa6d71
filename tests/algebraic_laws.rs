//! Property-based checks that `merge` satisfies the join-semilattice laws
//! (commutative, associative, idempotent) across representative CRDTs,
//! plus literal end-to-end convergence scenarios for each type.

use proptest::prelude::*;

use cauchy::crdt::{Crdt, GCounter, GSet, LwwRegister, OrSet, PnCounter, TwoPhaseSet};
use cauchy::VectorClock;

fn arb_gcounter(num_nodes: u32, max_delta: u64) -> impl Strategy<Value = GCounter> {
    proptest::collection::vec(0..=max_delta, num_nodes as usize).prop_map(move |deltas| {
        let mut gc = GCounter::new(num_nodes);
        for (node, delta) in deltas.into_iter().enumerate() {
            gc.add(node as u32, delta);
        }
        gc
    })
}

proptest! {
    #[test]
    fn gcounter_merge_is_commutative_associative_idempotent(
        a in arb_gcounter(4, 50),
        b in arb_gcounter(4, 50),
        c in arb_gcounter(4, 50),
    ) {
        let mut ab = a; ab.merge(&b);
        let mut ba = b; ba.merge(&a);
        prop_assert!(ab.equals(&ba));

        let mut ab_c = ab; ab_c.merge(&c);
        let mut bc = b; bc.merge(&c);
        let mut a_bc = a; a_bc.merge(&bc);
        prop_assert!(ab_c.equals(&a_bc));

        let mut aa = a; aa.merge(&a);
        prop_assert!(aa.equals(&a));
    }

    #[test]
    fn pncounter_merge_is_commutative_and_idempotent(
        pos_a in 0..100u64, neg_a in 0..100u64,
        pos_b in 0..100u64, neg_b in 0..100u64,
    ) {
        let mut a = PnCounter::new(2);
        a.add(0, pos_a as i64);
        a.add(0, -(neg_a as i64));
        let mut b = PnCounter::new(2);
        b.add(1, pos_b as i64);
        b.add(1, -(neg_b as i64));

        let mut ab = a; ab.merge(&b);
        let mut ba = b; ba.merge(&a);
        prop_assert!(ab.equals(&ba));
        prop_assert_eq!(ab.value(), ba.value());

        let mut aa = a; aa.merge(&a);
        prop_assert!(aa.equals(&a));
    }

    #[test]
    fn gset_merge_is_commutative_and_idempotent(
        xs in proptest::collection::vec(0u8..10, 0..8),
        ys in proptest::collection::vec(0u8..10, 0..8),
    ) {
        let mut a = GSet::new(4);
        for x in &xs { a.add(&[*x]).unwrap(); }
        let mut b = GSet::new(4);
        for y in &ys { b.add(&[*y]).unwrap(); }

        let mut ab = a.clone(); ab.merge(&b);
        let mut ba = b.clone(); ba.merge(&a);
        prop_assert!(ab.equals(&ba));

        let mut aa = a.clone(); aa.merge(&a);
        prop_assert!(aa.equals(&a));
    }

    #[test]
    fn twophaseset_merge_is_commutative(
        added_a in proptest::collection::vec(0u8..6, 0..6),
        removed_a in proptest::collection::vec(0u8..6, 0..6),
        added_b in proptest::collection::vec(0u8..6, 0..6),
    ) {
        let mut a = TwoPhaseSet::new(4);
        for x in &added_a { let _ = a.add(&[*x]); }
        for x in &removed_a { let _ = a.remove(&[*x]); }
        let mut b = TwoPhaseSet::new(4);
        for x in &added_b { let _ = b.add(&[*x]); }

        let mut ab = a.clone(); ab.merge(&b);
        let mut ba = b.clone(); ba.merge(&a);
        prop_assert!(ab.equals(&ba));
    }

    #[test]
    fn lww_register_accept_rule_never_goes_backward(
        ts1 in 0u64..20, node1 in 0u64..5,
        ts2 in 0u64..20, node2 in 0u64..5,
    ) {
        let mut reg = LwwRegister::new();
        reg.set(b"a", ts1, node1).unwrap();
        let stamp_before = (reg.timestamp(), reg.node_id());
        reg.set(b"b", ts2, node2).unwrap();
        let stamp_after = (reg.timestamp(), reg.node_id());
        prop_assert!(stamp_after >= stamp_before);
    }
}

#[test]
fn gcounter_three_node_convergence_scenario() {
    let mut n0 = GCounter::new(3);
    let mut n1 = GCounter::new(3);
    let mut n2 = GCounter::new(3);
    for _ in 0..100 {
        n0.increment(0);
    }
    for _ in 0..50 {
        n1.increment(1);
    }
    for _ in 0..75 {
        n2.increment(2);
    }
    n0.merge(&n1);
    n0.merge(&n2);
    n1.merge(&n0);
    n2.merge(&n1);
    assert_eq!(n0.value(), 225);
    assert_eq!(n1.value(), 225);
    assert_eq!(n2.value(), 225);
    assert!(n0.equals(&n1) && n1.equals(&n2));
}

#[test]
fn pncounter_sign_scenario() {
    let mut n0 = PnCounter::new(2);
    n0.add(0, 10);
    n0.add(0, -3);
    let mut n1 = PnCounter::new(2);
    n1.add(1, 5);
    n1.add(1, -7);
    n0.merge(&n1);
    n1.merge(&n0);
    assert_eq!(n0.value(), 5);
    assert_eq!(n1.value(), 5);
}

#[test]
fn lww_register_tie_break_scenario() {
    let mut reg = LwwRegister::new();
    reg.set(b"A", 7, 1).unwrap();
    reg.set(b"B", 7, 4).unwrap();
    assert_eq!(reg.get(), Some(&b"B"[..]));
    assert_eq!(reg.timestamp(), 7);
    assert_eq!(reg.node_id(), 4);
}

#[test]
fn two_phase_set_permanence_scenario() {
    let mut set = TwoPhaseSet::new(4);
    set.add(b"x").unwrap();
    set.remove(b"x").unwrap();
    set.add(b"x").unwrap();
    assert!(!set.contains(b"x"));
    assert_eq!(set.count(), 0);
}

#[test]
fn or_set_add_wins_scenario() {
    let mut r1 = OrSet::new(4, 1);
    r1.add(b"k").unwrap();
    let mut r2 = r1.clone();

    r1.remove(b"k").unwrap();
    r2.add(b"k").unwrap();

    let mut merged_12 = r1.clone();
    merged_12.merge(&r2);
    let mut merged_21 = r2.clone();
    merged_21.merge(&r1);

    assert!(merged_12.contains(b"k"));
    assert!(merged_21.contains(b"k"));
    assert_eq!(merged_12.count(), 1);
    assert_eq!(merged_21.count(), 1);
}

#[test]
fn vector_clock_causality_scenario() {
    let mut a = VectorClock::new(3);
    a.set(0, 3);
    a.set(1, 2);
    a.set(2, 0);

    let mut b = VectorClock::new(3);
    b.set(0, 3);
    b.set(1, 2);
    b.set(2, 1);
    assert!(a.happens_before(&b));

    let mut b_prime = VectorClock::new(3);
    b_prime.set(0, 3);
    b_prime.set(1, 3);
    b_prime.set(2, 0);
    assert!(a.happens_before(&b_prime));

    let mut c = VectorClock::new(3);
    c.set(0, 4);
    c.set(1, 1);
    c.set(2, 0);
    assert!(a.concurrent_with(&c));
}
