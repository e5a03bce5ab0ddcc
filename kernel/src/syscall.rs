//! Syscall surface of the scheduling/IPC core.
//!
//! The architecture entry stub decodes registers into a [`Syscall`] and
//! calls [`dispatch`], which returns the value placed back in RAX.
//!
//! Return codes:
//!   - scheduling parameters (`SchedPolicy`, `ExecTime`, `Rate`,
//!     `Deadline`): 0, or `EINVAL` (-22) on any failure;
//!   - IPC and process calls: 0, or `ERR` (-1) on a bad pid or full queue.
//!
//! Pids are never reused, so once `NPROC - 1` processes have existed new
//! pids fall outside the queue range: `Recv` by such a caller and `Send`
//! to it both return `ERR`.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::Kernel;
use crate::config::MULTICAST_FANOUT;
use crate::error::{ERR, KernelError};
use crate::ipc::Payload;
use crate::sync::park::Parker;
use crate::task::process::{Pid, Policy};

// ── Syscall numbers ─────────────────────────────────────────────

pub mod nr {
    /// `getpid()`: pid of the caller.
    pub const GETPID: usize = 0;
    /// `kill(pid)`: mark a process killed.
    pub const KILL: usize = 1;
    /// `uptime()`: ticks since boot.
    pub const UPTIME: usize = 2;
    /// `add(a, b)`: returns `a + b`.
    pub const ADD: usize = 3;
    /// `toggle()`: switch syscall tracing on or off.
    pub const TOGGLE: usize = 4;
    /// `print_count()`: log the per-syscall counters.
    pub const PRINT_COUNT: usize = 5;
    /// `ps()`: log the process table.
    pub const PS: usize = 6;
    /// `send(sender, receiver, msg)`: enqueue one message.
    pub const SEND: usize = 7;
    /// `recv(buf)`: block for the caller's next message. Returns `ERR` at
    /// once if the caller's pid is `NPROC` or above (no queue).
    pub const RECV: usize = 8;
    /// `send_multi(sender, receivers[8], msg)`: best-effort broadcast.
    pub const SEND_MULTI: usize = 9;
    /// `sched_policy(pid, policy)`: assign a policy and run admission.
    pub const SCHED_POLICY: usize = 10;
    /// `exec_time(pid, ticks)`
    pub const EXEC_TIME: usize = 11;
    /// `rate(pid, rate)`: RMS rate class, 1..=30.
    pub const RATE: usize = 12;
    /// `deadline(pid, ticks)`: relative EDF deadline.
    pub const DEADLINE: usize = 13;

    pub const COUNT: usize = 14;
}

/// Names used by the counter report, indexed by syscall number.
pub const NAMES: [&str; nr::COUNT] = [
    "sys_getpid",
    "sys_kill",
    "sys_uptime",
    "sys_add",
    "sys_toggle",
    "sys_print_count",
    "sys_ps",
    "sys_send",
    "sys_recv",
    "sys_send_multi",
    "sys_sched_policy",
    "sys_exec_time",
    "sys_rate",
    "sys_deadline",
];

// ── Tracing ─────────────────────────────────────────────────────

/// Per-syscall invocation counters, active while tracing is on.
pub struct SyscallTrace {
    enabled: AtomicBool,
    counts: [AtomicU32; nr::COUNT],
}

impl SyscallTrace {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            counts: [const { AtomicU32::new(0) }; nr::COUNT],
        }
    }

    pub fn set_enabled(&self, on: bool) {
        if !on {
            self.clear();
        }
        self.enabled.store(on, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Flip tracing; switching it off clears every counter. Returns the
    /// new state.
    pub fn toggle(&self) -> bool {
        let on = !self.enabled.fetch_xor(true, Ordering::Relaxed);
        if !on {
            self.clear();
        }
        klog::debug!("syscall: tracing {}", if on { "on" } else { "off" });
        on
    }

    pub fn record(&self, nr: usize) {
        if self.is_enabled() {
            if let Some(c) = self.counts.get(nr) {
                c.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self, nr: usize) -> u32 {
        self.counts.get(nr).map_or(0, |c| c.load(Ordering::Relaxed))
    }

    fn clear(&self) {
        for c in &self.counts {
            c.store(0, Ordering::Relaxed);
        }
    }

    /// Log `name count` for each non-zero counter, names in alphabetical
    /// order. Logs nothing while tracing is off.
    pub fn report(&self) {
        if !self.is_enabled() {
            return;
        }
        let mut order: [usize; nr::COUNT] = core::array::from_fn(|i| i);
        order.sort_unstable_by_key(|&i| NAMES[i]);
        for i in order {
            let n = self.count(i);
            if n != 0 {
                klog::info!("{} {}", NAMES[i], n);
            }
        }
    }
}

impl Default for SyscallTrace {
    fn default() -> Self {
        Self::new()
    }
}

// ── Decoded calls ───────────────────────────────────────────────

/// A decoded syscall. Integer arguments are passed through as the caller
/// supplied them and validated in [`dispatch`].
#[derive(Debug)]
pub enum Syscall<'a> {
    GetPid,
    Kill { pid: i64 },
    Uptime,
    Add { a: i64, b: i64 },
    Toggle,
    PrintCount,
    Ps,
    Send { sender: i64, receiver: i64, msg: &'a [u8] },
    Recv { buf: &'a mut [u8] },
    SendMulti { sender: i64, receivers: [i64; MULTICAST_FANOUT], msg: &'a [u8] },
    SchedPolicy { pid: i64, policy: i64 },
    ExecTime { pid: i64, ticks: i64 },
    Rate { pid: i64, rate: i64 },
    Deadline { pid: i64, ticks: i64 },
}

impl Syscall<'_> {
    pub fn number(&self) -> usize {
        match self {
            Syscall::GetPid => nr::GETPID,
            Syscall::Kill { .. } => nr::KILL,
            Syscall::Uptime => nr::UPTIME,
            Syscall::Add { .. } => nr::ADD,
            Syscall::Toggle => nr::TOGGLE,
            Syscall::PrintCount => nr::PRINT_COUNT,
            Syscall::Ps => nr::PS,
            Syscall::Send { .. } => nr::SEND,
            Syscall::Recv { .. } => nr::RECV,
            Syscall::SendMulti { .. } => nr::SEND_MULTI,
            Syscall::SchedPolicy { .. } => nr::SCHED_POLICY,
            Syscall::ExecTime { .. } => nr::EXEC_TIME,
            Syscall::Rate { .. } => nr::RATE,
            Syscall::Deadline { .. } => nr::DEADLINE,
        }
    }

    pub fn name(&self) -> &'static str {
        NAMES[self.number()]
    }
}

// ── Dispatcher ──────────────────────────────────────────────────

fn pid_arg(raw: i64) -> Result<Pid, KernelError> {
    Pid::from_raw(raw).ok_or(KernelError::InvalidArgument)
}

fn u32_arg(raw: i64) -> Result<u32, KernelError> {
    u32::try_from(raw).map_err(|_| KernelError::InvalidArgument)
}

fn sched_ret(r: Result<(), KernelError>) -> i64 {
    match r {
        Ok(()) => 0,
        Err(e) => e.sched_errno(),
    }
}

fn ipc_ret(r: Result<(), KernelError>) -> i64 {
    match r {
        Ok(()) => 0,
        Err(e) => e.ipc_errno(),
    }
}

/// Execute `call` on behalf of `caller`. `parker` blocks the caller inside
/// `Recv` and wakes receivers on delivery.
pub fn dispatch<P: Parker>(kernel: &Kernel, caller: Pid, call: Syscall<'_>, parker: &P) -> i64 {
    kernel.trace.record(call.number());
    klog::trace!("syscall: pid {} {}", caller, call.name());

    match call {
        Syscall::GetPid => i64::from(caller.0),
        Syscall::Kill { pid } => {
            let r = pid_arg(pid).and_then(|pid| kernel.procs.lock().kill(pid));
            if r.is_ok() { 0 } else { ERR }
        }
        Syscall::Uptime => kernel.clock.now() as i64,
        Syscall::Add { a, b } => a.wrapping_add(b),
        Syscall::Toggle => {
            kernel.trace.toggle();
            0
        }
        Syscall::PrintCount => {
            kernel.trace.report();
            0
        }
        Syscall::Ps => {
            kernel.procs.lock().dump();
            0
        }
        Syscall::Send { sender, receiver, msg } => ipc_ret(
            pid_arg(sender)
                .and_then(|s| Ok((s, pid_arg(receiver)?)))
                .and_then(|(s, r)| kernel.mailboxes.send(s, r, Payload::new(msg), parker)),
        ),
        Syscall::Recv { buf } => match kernel.mailboxes.recv(caller, parker) {
            Ok(msg) => {
                msg.payload.copy_to(buf);
                0
            }
            Err(e) => e.ipc_errno(),
        },
        Syscall::SendMulti { sender, receivers, msg } => match pid_arg(sender) {
            Ok(sender) => {
                kernel
                    .mailboxes
                    .send_multi(sender, &receivers, Payload::new(msg), parker);
                0
            }
            Err(e) => e.ipc_errno(),
        },
        Syscall::SchedPolicy { pid, policy } => sched_ret(pid_arg(pid).and_then(|pid| {
            let policy = Policy::from_raw(policy).ok_or(KernelError::InvalidArgument)?;
            kernel.set_policy(pid, policy)
        })),
        Syscall::ExecTime { pid, ticks } => sched_ret(
            pid_arg(pid).and_then(|pid| kernel.set_execution_time(pid, u32_arg(ticks)?)),
        ),
        Syscall::Rate { pid, rate } => {
            sched_ret(pid_arg(pid).and_then(|pid| kernel.set_rate(pid, u32_arg(rate)?)))
        }
        Syscall::Deadline { pid, ticks } => sched_ret(
            pid_arg(pid).and_then(|pid| kernel.set_deadline(pid, u32_arg(ticks)?)),
        ),
    }
}
