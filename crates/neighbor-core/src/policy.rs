//! Decision policies
//!
//! Small stateful predicates answering "should I act on this event". Each
//! reply handler and request loop owns its own policy instance; handlers are
//! invoked concurrently, so every policy synchronizes its own state.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use hashbrown::HashSet;

use crate::types::SequenceNumber;

// ----------------------------------------------------------------------------
// Policy Trait
// ----------------------------------------------------------------------------

/// A boolean decision, possibly updating the policy's own state
pub trait Policy: Send + Sync {
    fn decide(&self) -> bool;
}

/// Acts every time
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl Policy for Always {
    fn decide(&self) -> bool {
        true
    }
}

/// Never acts
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl Policy for Never {
    fn decide(&self) -> bool {
        false
    }
}

// ----------------------------------------------------------------------------
// Bounded Counter
// ----------------------------------------------------------------------------

/// Outcome of one [`BoundedCounter`] invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterDecision {
    /// Keep acting
    Act,
    /// This invocation reached the limit; the owner must stop
    LimitReached,
    /// The limit was reached by an earlier invocation
    Exhausted,
}

impl CounterDecision {
    pub fn is_act(&self) -> bool {
        matches!(self, CounterDecision::Act)
    }

    pub fn is_exhausted(&self) -> bool {
        !self.is_act()
    }
}

/// Acts on invocations `1..limit`, reports exhaustion from invocation `limit` on
///
/// The count saturates at `limit` and never re-arms.
#[derive(Debug)]
pub struct BoundedCounter {
    count: AtomicU32,
    limit: u32,
}

impl BoundedCounter {
    pub fn new(limit: u32) -> Self {
        Self {
            count: AtomicU32::new(0),
            limit,
        }
    }

    /// Count one invocation and decide
    pub fn check(&self) -> CounterDecision {
        let limit = self.limit;
        let bumped = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < limit).then_some(count + 1)
            });

        match bumped {
            Ok(previous) if previous + 1 < limit => CounterDecision::Act,
            Ok(_) => CounterDecision::LimitReached,
            Err(_) => CounterDecision::Exhausted,
        }
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.count() >= self.limit
    }
}

impl Policy for BoundedCounter {
    fn decide(&self) -> bool {
        self.check().is_act()
    }
}

// ----------------------------------------------------------------------------
// Sequence Deduplication
// ----------------------------------------------------------------------------

/// Outcome of one [`SequenceDedup`] observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceDecision {
    FirstSeen,
    Duplicate,
}

/// Remembers every sequence number it has been shown
///
/// Numbers are never evicted; memory is bounded by the distinct numbers seen
/// during one run.
#[derive(Debug, Default)]
pub struct SequenceDedup {
    seen: Mutex<HashSet<SequenceNumber>>,
}

impl SequenceDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `sequence`, reporting whether it was already known
    pub fn observe(&self, sequence: SequenceNumber) -> SequenceDecision {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.insert(sequence) {
            SequenceDecision::FirstSeen
        } else {
            SequenceDecision::Duplicate
        }
    }

    /// Boolean form of [`observe`](Self::observe): true on first sight
    pub fn first_seen(&self, sequence: SequenceNumber) -> bool {
        self.observe(sequence) == SequenceDecision::FirstSeen
    }

    pub fn contains(&self, sequence: SequenceNumber) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&sequence)
    }

    /// Number of distinct sequence numbers seen
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ----------------------------------------------------------------------------
// Every N-th
// ----------------------------------------------------------------------------

/// Acts on invocations `n`, `2n`, `3n`, ...
#[derive(Debug)]
pub struct EveryNth {
    count: AtomicU64,
    n: u64,
}

impl EveryNth {
    /// `n` of zero is treated as one
    pub fn new(n: u32) -> Self {
        Self {
            count: AtomicU64::new(0),
            n: u64::from(n.max(1)),
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

impl Policy for EveryNth {
    fn decide(&self) -> bool {
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        count % self.n == 0
    }
}
