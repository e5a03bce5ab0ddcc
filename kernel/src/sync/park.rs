//! Park/unpark handshake for blocking receive.
//!
//! A receiver that finds its queue empty registers itself as a waiter under
//! the queue lock, drops the lock and parks. A sender that fills the queue
//! clears the waiter flag under the lock and unparks after dropping it.
//!
//! Contract for implementations:
//!   - an `unpark` that happens before the matching `park` is remembered,
//!     and that `park` returns immediately (no lost wake-ups);
//!   - `park` may return spuriously; callers always re-check their queue.

use crate::task::process::Pid;

pub trait Parker {
    /// Block the calling process `pid` until it is unparked.
    fn park(&self, pid: Pid);

    /// Make `pid` runnable again, or arm its next `park` to return at once.
    fn unpark(&self, pid: Pid);
}

/// Polls instead of blocking: `park` is a single spin-loop hint.
///
/// This is the legacy receive behavior: the receiver keeps its time slice
/// and re-checks its queue in a tight loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusyWait;

impl Parker for BusyWait {
    #[inline]
    fn park(&self, _pid: Pid) {
        core::hint::spin_loop();
    }

    #[inline]
    fn unpark(&self, _pid: Pid) {}
}

impl<P: Parker + ?Sized> Parker for &P {
    fn park(&self, pid: Pid) {
        (**self).park(pid)
    }

    fn unpark(&self, pid: Pid) {
        (**self).unpark(pid)
    }
}
