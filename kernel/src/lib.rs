// =============================================================================
// RTK: Kernel Core
// =============================================================================
//
// The scheduling and message-passing half of the kernel. Everything that
// touches hardware (boot, paging, traps, the context-switch assembly) lives
// outside this crate and talks to it through two seams:
//
//   - `task::scheduler::Cpu`: resume a process / hand the CPU back
//   - `sync::park::Parker`  : block a receiver until a message arrives
//
// SHARED STATE:
//   Two independent locks, never nested:
//     - the process table (ticket `SpinLock`): states, policies, deadlines
//     - the message queue store (`spin::Mutex`): all per-process queues
//
// =============================================================================

// Hosted tests link `std`; the kernel proper is freestanding.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod ipc;
pub mod sync;
pub mod syscall;
pub mod task;

use config::KernelConfig;
use error::KResult;
use ipc::Mailboxes;
use sync::spinlock::SpinLock;
use syscall::SyscallTrace;
use task::clock::Clock;
use task::process::{Pid, ProcTable};

/// All kernel-wide mutable state of the scheduling/IPC core.
///
/// One instance backs the running kernel ([`KERNEL`]); tests build their
/// own so they never share tables.
pub struct Kernel {
    /// Process table, guarded by the table-wide lock.
    pub procs: SpinLock<ProcTable>,
    /// Per-process message queues, guarded by their own lock.
    pub mailboxes: Mailboxes,
    /// Monotonic tick counter (driven by the timer interrupt).
    pub clock: Clock,
    /// Per-syscall invocation counters.
    pub trace: SyscallTrace,
}

impl Kernel {
    pub const fn new() -> Self {
        Self {
            procs: SpinLock::new(ProcTable::new()),
            mailboxes: Mailboxes::new(),
            clock: Clock::new(),
            trace: SyscallTrace::new(),
        }
    }

    /// Apply runtime configuration. Safe to call more than once.
    pub fn init(&self, cfg: &KernelConfig) {
        klog::set_max_level(cfg.log_level);
        if klog::init_log_bridge().is_err() {
            klog::debug!("log facade already has a backend");
        }
        self.trace.set_enabled(cfg.trace_syscalls);
        klog::info!(
            "kernel core up: {} process slots, {}-entry message queues",
            config::NPROC,
            config::MSG_QUEUE_CAPACITY
        );
    }

    /// Create a process and mark it runnable (`Unused -> Embryo -> Runnable`).
    pub fn spawn(&self, parent: Option<Pid>) -> KResult<Pid> {
        let mut procs = self.procs.lock();
        let pid = procs.alloc(parent)?;
        procs.make_runnable(pid)?;
        Ok(pid)
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

/// The kernel instance used by the syscall entry path.
pub static KERNEL: Kernel = Kernel::new();
