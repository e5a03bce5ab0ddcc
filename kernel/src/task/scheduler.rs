//! Scheduler core: per-round process selection and the per-core run loop.
//!
//! Policy arbitration: the table is scanned in slot order and the first
//! `Runnable` process carrying a real-time policy decides the class for the
//! whole round. Only processes of that class are considered; a runnable
//! process of the other real-time class waits, possibly forever, while the
//! chosen class keeps winning the scan. Round-Robin runs only when no
//! runnable process has a real-time policy.
//!
//! Comparators:
//!   Round-Robin: highest pid among `Runnable` (no rotation pointer).
//!   EDF        : smallest `deadline + arrival_time`, ties to smallest pid.
//!   RMS        : smallest weight `max(1, ceil(3 * (30 - rate) / 29))`,
//!                 ties to smallest pid.
//! EDF and RMS consider `Runnable` and `Running` processes alike.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::Kernel;
use crate::config::RATE_MAX;
use crate::sync::spinlock::SpinLockGuard;
use crate::task::process::{Pid, Policy, ProcState, ProcTable, Process, StateSet};

/// The hardware side of a context switch, implemented outside the core.
pub trait Cpu {
    /// Resume `pid` on this core. Returns once it gives the CPU back; by
    /// then the process has moved itself out of `Running`.
    fn switch_to(&self, pid: Pid);

    /// Called by a running process to hand the CPU back to this core's
    /// scheduler loop. The caller has already left `Running` and still
    /// holds the table lock in `held`; the implementation releases it only
    /// after the caller's context is saved, so no other core can resume the
    /// caller while it is still executing here. Returns when the process is
    /// scheduled again.
    fn sched(&self, held: SpinLockGuard<'_, ProcTable>);
}

/// RMS priority weight; smaller runs first.
pub fn rms_weight(rate: u32) -> u32 {
    let span = 3 * RATE_MAX.saturating_sub(rate);
    span.div_ceil(29).max(1)
}

/// The class arbitrated this round: the policy of the first runnable
/// real-time process in slot order, else Round-Robin.
pub fn round_policy(table: &ProcTable) -> Policy {
    table
        .iter()
        .find(|p| p.state == ProcState::Runnable && p.policy.is_realtime())
        .map_or(Policy::RoundRobin, |p| p.policy)
}

fn choose_round_robin(table: &ProcTable) -> Option<usize> {
    table
        .iter()
        .enumerate()
        .filter(|(_, p)| p.state == ProcState::Runnable)
        .max_by_key(|(_, p)| p.pid)
        .map(|(idx, _)| idx)
}

fn eligible(table: &ProcTable, policy: Policy) -> impl Iterator<Item = (usize, &Process)> {
    table
        .iter()
        .enumerate()
        .filter(move |(_, p)| p.policy == policy && p.state.is_in(StateSet::ELIGIBLE))
}

fn choose_edf(table: &ProcTable) -> Option<usize> {
    eligible(table, Policy::Edf)
        .min_by_key(|(_, p)| (p.absolute_deadline(), p.pid))
        .map(|(idx, _)| idx)
}

fn choose_rms(table: &ProcTable) -> Option<usize> {
    eligible(table, Policy::Rms)
        .min_by_key(|(_, p)| (rms_weight(p.rate), p.pid))
        .map(|(idx, _)| idx)
}

/// Pick the process to run next and mark it `Running`.
///
/// Must be called with the table lock held. `None` means this core idles:
/// either nothing is runnable, or the winner of the round is already
/// running on another core.
pub fn pick_next(table: &mut ProcTable) -> Option<Pid> {
    let policy = round_policy(table);
    let idx = match policy {
        Policy::RoundRobin => choose_round_robin(table),
        Policy::Edf => choose_edf(table),
        Policy::Rms => choose_rms(table),
    }?;

    let proc = &mut table.slots_mut()[idx];
    if proc.state != ProcState::Runnable {
        klog::trace!("sched: {} winner pid {} already running", policy, proc.pid);
        return None;
    }
    proc.state = ProcState::Running;
    klog::trace!("sched: {} picked pid {}", policy, proc.pid);
    Some(proc.pid)
}

/// Outcome of one scheduling round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    Idle,
    Ran(Pid),
}

/// Per-core scheduler loop state.
pub struct Scheduler {
    rounds: AtomicU64,
    idle_rounds: AtomicU64,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            rounds: AtomicU64::new(0),
            idle_rounds: AtomicU64::new(0),
        }
    }

    /// One round: decide and transition under the table lock, then switch
    /// with the lock released.
    pub fn run_once<C: Cpu>(&self, kernel: &Kernel, cpu: &C) -> Round {
        self.rounds.fetch_add(1, Ordering::Relaxed);

        let next = pick_next(&mut kernel.procs.lock());
        match next {
            Some(pid) => {
                cpu.switch_to(pid);
                Round::Ran(pid)
            }
            None => {
                self.idle_rounds.fetch_add(1, Ordering::Relaxed);
                Round::Idle
            }
        }
    }

    /// The per-core scheduler loop. Never returns.
    pub fn run<C: Cpu>(&self, kernel: &Kernel, cpu: &C) -> ! {
        klog::info!("sched: entering scheduler loop");
        loop {
            if self.run_once(kernel, cpu) == Round::Idle {
                core::hint::spin_loop();
            }
        }
    }

    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }

    pub fn idle_rounds(&self) -> u64 {
        self.idle_rounds.load(Ordering::Relaxed)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
