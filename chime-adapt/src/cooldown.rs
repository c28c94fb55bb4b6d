//! Fixed-interval cooldown between quality adjustments
//!
//! The gate opens when no adjustment has happened yet or strictly more than
//! `cooldown_ms` has passed since the last one. Opening stores the current
//! time with a compare-and-swap, so two overlapping callers can never both
//! pass inside one window.

use std::sync::atomic::{AtomicU64, Ordering};

const NEVER: u64 = u64::MAX;

/// Outcome of asking the gate for permission to adjust
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Caller owns this adjustment; `previous` is the timestamp it replaced
    Open { previous: Option<u64> },
    /// Still cooling down
    Closed { remaining_ms: u64 },
}

impl GateDecision {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Holds the time of the last successful adjustment
#[derive(Debug)]
pub struct CooldownGate {
    last_adjustment_ms: AtomicU64,
}

impl CooldownGate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_adjustment_ms: AtomicU64::new(NEVER),
        }
    }

    pub fn try_acquire(&self, now_ms: u64, cooldown_ms: u64) -> GateDecision {
        let mut current = self.last_adjustment_ms.load(Ordering::Acquire);
        loop {
            if current != NEVER {
                let elapsed = now_ms.saturating_sub(current);
                if elapsed <= cooldown_ms {
                    return GateDecision::Closed {
                        remaining_ms: cooldown_ms - elapsed,
                    };
                }
            }

            match self.last_adjustment_ms.compare_exchange_weak(
                current,
                now_ms,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return GateDecision::Open {
                        previous: (current != NEVER).then_some(current),
                    }
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Undo an acquisition whose adjustment did not go through
    ///
    /// Leaves the gate untouched if someone else has acquired it since.
    pub fn rollback(&self, acquired_at_ms: u64, previous: Option<u64>) {
        let _ = self.last_adjustment_ms.compare_exchange(
            acquired_at_ms,
            previous.unwrap_or(NEVER),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    #[must_use]
    pub fn last_adjustment_ms(&self) -> Option<u64> {
        let last = self.last_adjustment_ms.load(Ordering::Acquire);
        (last != NEVER).then_some(last)
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}
