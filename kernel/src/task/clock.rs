//! Kernel tick counter.
//!
//! Monotonically increasing, advanced by the timer interrupt. The scheduler
//! core only reads it: EDF arrival times are stamped from `now()`.

use core::sync::atomic::{AtomicU64, Ordering};

pub struct Clock {
    ticks: AtomicU64,
}

impl Clock {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Called by the timer interrupt handler on every tick.
    /// Returns the new tick count.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Advance by several ticks at once (coalesced timer interrupts).
    #[inline]
    pub fn advance(&self, ticks: u64) -> u64 {
        self.ticks.fetch_add(ticks, Ordering::Relaxed) + ticks
    }

    /// Return the current tick count.
    #[inline]
    pub fn now(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
