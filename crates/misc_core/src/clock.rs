//! Wall-clock abstraction for lifecycle stamps.

use crate::model::entity::EpochMillis;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> EpochMillis;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> EpochMillis {
        (**self).now_ms()
    }
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMillis {
        // A clock set before 1970 reads as the epoch rather than failing a save.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as EpochMillis)
    }
}

/// Deterministic clock: every reading returns the current value, then
/// advances it by `step_ms`.
#[derive(Debug, Default)]
pub struct ManualClock {
    next_ms: AtomicI64,
    step_ms: i64,
}

impl ManualClock {
    /// A clock frozen at `now_ms`.
    pub fn new(now_ms: EpochMillis) -> Self {
        Self::stepping(now_ms, 0)
    }

    /// A clock that starts at `start_ms` and ticks `step_ms` per reading.
    pub fn stepping(start_ms: EpochMillis, step_ms: i64) -> Self {
        Self {
            next_ms: AtomicI64::new(start_ms),
            step_ms,
        }
    }

    pub fn set(&self, now_ms: EpochMillis) {
        self.next_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.next_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> EpochMillis {
        self.next_ms.fetch_add(self.step_ms, Ordering::SeqCst)
    }
}
