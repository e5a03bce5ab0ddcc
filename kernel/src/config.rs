//! Kernel parameters.
//!
//! Table sizes are compile-time constants (every table is a fixed array);
//! the few knobs that can change at runtime live in [`KernelConfig`].

/// Number of process slots. Process ids used as IPC addresses must be below it.
pub const NPROC: usize = 64;

/// Entries per message queue.
pub const MSG_QUEUE_CAPACITY: usize = 10;

/// Message payload size in bytes, including the NUL terminator.
pub const MSG_SIZE: usize = 8;

/// Receiver slots in one broadcast.
pub const MULTICAST_FANOUT: usize = 8;

/// Lowest accepted RMS rate class.
pub const RATE_MIN: u32 = 1;

/// Highest accepted RMS rate class (shortest period).
pub const RATE_MAX: u32 = 30;

/// Absolute precision of the bisection computing the n-th root of 2 in the
/// RMS bound. Boundary results depend on it: with this precision the bound
/// for a single process is 99, not 100.
pub const ROOT_PRECISION: f64 = 1e-4;

/// EDF utilization ceiling, in percent.
pub const UTILIZATION_CAP: u64 = 100;

/// Runtime configuration applied by `Kernel::init`.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Lowest log level that reaches the console.
    pub log_level: klog::Level,
    /// Count syscall invocations from boot.
    pub trace_syscalls: bool,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            log_level: klog::Level::Info,
            trace_syscalls: false,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
