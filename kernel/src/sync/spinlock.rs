// =============================================================================
// RTK: Ticket Spinlock
// =============================================================================
//
// Guards the process table. Every scheduling decision reads and writes
// process states while holding it, so a decision and the state change it
// implies ("pick X, mark X Running") are one atomic step for other cores.
//
// HOW IT WORKS:
//   - Two counters: `next_ticket` and `now_serving`
//   - To lock: atomically take a ticket from `next_ticket`, spin until
//     `now_serving` reaches it.
//   - To unlock: increment `now_serving`, admitting the next waiter.
//   Waiters are served in FIFO order, so no core starves on the table.
//
// IRQ SAFETY:
//   With the `irq-mask` feature the lock saves RFLAGS.IF and disables
//   interrupts before taking a ticket, restoring the saved state on unlock.
//   A timer handler that wants the table can therefore never spin on a lock
//   held by the code it interrupted. Hosted builds (tests) leave the
//   interrupt flag alone.
// =============================================================================

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU32, Ordering};

/// A ticket-based spinlock.
pub struct SpinLock<T> {
    /// The next ticket to be dispensed.
    next_ticket: AtomicU32,

    /// The ticket currently allowed in.
    now_serving: AtomicU32,

    data: UnsafeCell<T>,
}

// SAFETY: the lock hands out at most one guard at a time, so `T` is only
// ever reached from one core; `T: Send` is all that is required.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates an unlocked spinlock. `const` so it can back a `static`.
    pub const fn new(value: T) -> Self {
        Self {
            next_ticket: AtomicU32::new(0),
            now_serving: AtomicU32::new(0),
            data: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, spinning until our ticket is served.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let irq_was_enabled = irq::save_and_disable();

        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        // Acquire pairs with the Release in `drop`: we observe every write
        // the previous holder made to `data`.
        while self.now_serving.load(Ordering::Acquire) != my_ticket {
            core::hint::spin_loop();
        }

        SpinLockGuard {
            lock: self,
            irq_was_enabled,
        }
    }

    /// Acquires the lock only if nobody holds or waits for it.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let irq_was_enabled = irq::save_and_disable();

        let current = self.now_serving.load(Ordering::Relaxed);
        let result = self.next_ticket.compare_exchange(
            current,
            current.wrapping_add(1),
            Ordering::Acquire,
            Ordering::Relaxed,
        );

        match result {
            Ok(_) => Some(SpinLockGuard {
                lock: self,
                irq_was_enabled,
            }),
            Err(_) => {
                irq::restore(irq_was_enabled);
                None
            }
        }
    }

    /// True while some guard is alive (or a waiter holds a ticket).
    pub fn is_locked(&self) -> bool {
        self.next_ticket.load(Ordering::Relaxed) != self.now_serving.load(Ordering::Relaxed)
    }

    /// Exclusive access without locking; `&mut self` already proves it.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

/// RAII guard for a held spinlock. Dropping it releases the lock and
/// restores the interrupt flag saved at acquisition.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
    irq_was_enabled: bool,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard is proof of exclusive access.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard is proof of exclusive access.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // Release: our writes to `data` are visible before the next ticket
        // holder sees `now_serving` move.
        self.lock.now_serving.fetch_add(1, Ordering::Release);
        irq::restore(self.irq_was_enabled);
    }
}

// =============================================================================
// Interrupt state management
// =============================================================================

#[cfg(feature = "irq-mask")]
mod irq {
    use x86_64::instructions::interrupts;

    /// Returns whether IF was set, then clears it.
    #[inline(always)]
    pub fn save_and_disable() -> bool {
        let was_enabled = interrupts::are_enabled();
        interrupts::disable();
        was_enabled
    }

    #[inline(always)]
    pub fn restore(was_enabled: bool) {
        if was_enabled {
            interrupts::enable();
        }
    }
}

#[cfg(not(feature = "irq-mask"))]
mod irq {
    #[inline(always)]
    pub fn save_and_disable() -> bool {
        false
    }

    #[inline(always)]
    pub fn restore(_was_enabled: bool) {}
}
