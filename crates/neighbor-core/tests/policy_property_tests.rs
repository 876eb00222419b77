//! Property-based tests for the decision policies
//!
//! These tests verify the counting and deduplication invariants the scenarios
//! rely on, both for arbitrary inputs and under concurrent invocation.

use neighbor_core::{
    Always, BoundedCounter, CounterDecision, EveryNth, Never, Policy, SequenceDecision,
    SequenceDedup, SequenceNumber,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Generate sequence number streams with plenty of repeats
fn arb_sequence_stream() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..32, 0..200)
}

proptest! {
    /// Property: a counter with limit N acts exactly N-1 times, then stays exhausted
    #[test]
    fn bounded_counter_acts_limit_minus_one(limit in 1u32..200, extra in 0u32..50) {
        let counter = BoundedCounter::new(limit);
        let decisions: Vec<_> = (0..limit + extra).map(|_| counter.check()).collect();

        let acts = decisions.iter().filter(|d| d.is_act()).count() as u32;
        prop_assert_eq!(acts, limit - 1);
        prop_assert!(decisions[..(limit - 1) as usize].iter().all(|d| d.is_act()));
        prop_assert_eq!(decisions[(limit - 1) as usize], CounterDecision::LimitReached);
        prop_assert!(decisions[limit as usize..]
            .iter()
            .all(|d| *d == CounterDecision::Exhausted));
        prop_assert_eq!(counter.count(), limit);
    }

    /// Property: first occurrence of each value is FirstSeen, all repeats are Duplicate
    #[test]
    fn sequence_dedup_first_then_duplicate(stream in arb_sequence_stream()) {
        let dedup = SequenceDedup::new();
        let mut reference = HashSet::new();

        for value in &stream {
            let expected = if reference.insert(*value) {
                SequenceDecision::FirstSeen
            } else {
                SequenceDecision::Duplicate
            };
            prop_assert_eq!(dedup.observe(SequenceNumber::new(*value)), expected);
        }
        prop_assert_eq!(dedup.len(), reference.len());
    }

    /// Property: stateless policies never change their decision
    #[test]
    fn stateless_policies_are_idempotent(invocations in 1usize..500) {
        prop_assert!((0..invocations).all(|_| Always.decide()));
        prop_assert!((0..invocations).all(|_| !Never.decide()));
    }

    /// Property: EveryNth fires floor(k / n) times over k invocations
    #[test]
    fn every_nth_fire_count(n in 1u32..20, invocations in 0u32..400) {
        let policy = EveryNth::new(n);
        let fired = (0..invocations).filter(|_| policy.decide()).count() as u32;
        prop_assert_eq!(fired, invocations / n);
    }
}

// ----------------------------------------------------------------------------
// Concurrency
// ----------------------------------------------------------------------------

#[test]
fn test_bounded_counter_under_contention() {
    let counter = Arc::new(BoundedCounter::new(10));
    let acts = Arc::new(AtomicU32::new(0));
    let limit_hits = Arc::new(AtomicU32::new(0));

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let counter = counter.clone();
            let acts = acts.clone();
            let limit_hits = limit_hits.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    match counter.check() {
                        CounterDecision::Act => {
                            acts.fetch_add(1, Ordering::SeqCst);
                        }
                        CounterDecision::LimitReached => {
                            limit_hits.fetch_add(1, Ordering::SeqCst);
                        }
                        CounterDecision::Exhausted => {}
                    }
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(acts.load(Ordering::SeqCst), 9);
    assert_eq!(limit_hits.load(Ordering::SeqCst), 1);
    assert_eq!(counter.count(), 10);
}

#[test]
fn test_sequence_dedup_under_contention() {
    let dedup = Arc::new(SequenceDedup::new());
    let first_seen = Arc::new(AtomicU32::new(0));

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let dedup = dedup.clone();
            let first_seen = first_seen.clone();
            std::thread::spawn(move || {
                for value in 0..50u64 {
                    if dedup.first_seen(SequenceNumber::new(value)) {
                        first_seen.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    // Each of the 50 values is first-seen by exactly one thread
    assert_eq!(first_seen.load(Ordering::SeqCst), 50);
    assert_eq!(dedup.len(), 50);
}
