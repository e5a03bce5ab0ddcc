//! Process table: PCB slots, lifecycle state machine, scheduling fields.
//!
//! The table is a fixed array of [`NPROC`] slots. A slot is reused across
//! processes; `Unused` is the only state in which it receives a new pid.
//!
//! Lifecycle:
//!   Unused → Embryo → Runnable ⇄ Running → Sleeping | Zombie
//!   Sleeping → Runnable, Zombie → Unused (reaped by the parent)
//!   any live state → Unused (admission rejection; the parent is never told)
//!
//! Every method here expects the caller to hold the table lock.

use core::fmt;

use bitflags::bitflags;

use crate::config::{NPROC, RATE_MAX, RATE_MIN};
use crate::error::{KResult, KernelError};

// ── Process identifiers ─────────────────────────────────────────

/// Process identifier. Assigned monotonically from 1; `Pid(0)` is never a
/// process but is a valid IPC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl Pid {
    /// Decode a raw syscall argument. Negative or oversized values are `None`.
    pub fn from_raw(raw: i64) -> Option<Pid> {
        u32::try_from(raw).ok().map(Pid)
    }

    /// Index of this pid's message queue, if it addresses one.
    #[inline]
    pub fn queue_index(self) -> Option<usize> {
        let idx = self.0 as usize;
        (idx < NPROC).then_some(idx)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Process state ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Free slot.
    Unused,
    /// Being set up by its creator.
    Embryo,
    /// Blocked until woken.
    Sleeping,
    /// Ready to be scheduled.
    Runnable,
    /// Currently on a CPU.
    Running,
    /// Exited, waiting for the parent to reap it.
    Zombie,
}

bitflags! {
    /// A set of process states, used to filter table scans.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StateSet: u8 {
        const UNUSED   = 1 << 0;
        const EMBRYO   = 1 << 1;
        const SLEEPING = 1 << 2;
        const RUNNABLE = 1 << 3;
        const RUNNING  = 1 << 4;
        const ZOMBIE   = 1 << 5;

        /// States the real-time policies schedule and account for.
        const ELIGIBLE = Self::RUNNABLE.bits() | Self::RUNNING.bits();
        /// States a process may exit from.
        const EXITABLE = Self::EMBRYO.bits()
            | Self::SLEEPING.bits()
            | Self::RUNNABLE.bits()
            | Self::RUNNING.bits();
    }
}

impl ProcState {
    pub fn mask(self) -> StateSet {
        match self {
            ProcState::Unused => StateSet::UNUSED,
            ProcState::Embryo => StateSet::EMBRYO,
            ProcState::Sleeping => StateSet::SLEEPING,
            ProcState::Runnable => StateSet::RUNNABLE,
            ProcState::Running => StateSet::RUNNING,
            ProcState::Zombie => StateSet::ZOMBIE,
        }
    }

    #[inline]
    pub fn is_in(self, set: StateSet) -> bool {
        set.contains(self.mask())
    }

    /// Fixed-width name used by the process dump.
    pub fn as_str(self) -> &'static str {
        match self {
            ProcState::Unused => "unused",
            ProcState::Embryo => "embryo",
            ProcState::Sleeping => "sleep ",
            ProcState::Runnable => "runble",
            ProcState::Running => "run   ",
            ProcState::Zombie => "zombie",
        }
    }
}

// ── Scheduling policy ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Default class.
    #[default]
    RoundRobin,
    /// Earliest Deadline First.
    Edf,
    /// Rate-Monotonic.
    Rms,
}

impl Policy {
    /// Decode the syscall encoding: `-1` default, `0` EDF, `1` RMS.
    pub fn from_raw(raw: i64) -> Option<Policy> {
        match raw {
            -1 => Some(Policy::RoundRobin),
            0 => Some(Policy::Edf),
            1 => Some(Policy::Rms),
            _ => None,
        }
    }

    #[inline]
    pub fn is_realtime(self) -> bool {
        self != Policy::RoundRobin
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Policy::RoundRobin => "rr",
            Policy::Edf => "edf",
            Policy::Rms => "rms",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Process Control Block ───────────────────────────────────────

/// One process record. Only the scheduling-relevant part of a PCB; memory,
/// files and saved registers belong to the rest of the kernel.
#[derive(Debug, Clone, Copy)]
pub struct Process {
    pub pid: Pid,
    pub parent: Option<Pid>,
    pub state: ProcState,
    pub policy: Policy,
    /// Worst-case CPU demand per period, in ticks.
    pub execution_time: u32,
    /// Relative EDF deadline, in ticks.
    pub deadline: u32,
    /// RMS rate class, 1..=30 (higher means a shorter period).
    pub rate: u32,
    /// Tick at which the current policy was assigned.
    pub arrival_time: u64,
    /// Sticky kill request, honored at the process's next checkpoint.
    pub killed: bool,
    /// An unpark arrived while the process was not parked.
    wakeup_pending: bool,
}

impl Process {
    const EMPTY: Process = Process {
        pid: Pid(0),
        parent: None,
        state: ProcState::Unused,
        policy: Policy::RoundRobin,
        execution_time: 0,
        deadline: 0,
        rate: 0,
        arrival_time: 0,
        killed: false,
        wakeup_pending: false,
    };

    /// EDF ordering key: the relative deadline anchored at the arrival tick.
    #[inline]
    pub fn absolute_deadline(&self) -> u64 {
        self.arrival_time + u64::from(self.deadline)
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.state != ProcState::Unused
    }
}

// ── Process table ───────────────────────────────────────────────

pub struct ProcTable {
    slots: [Process; NPROC],
    next_pid: u32,
}

impl ProcTable {
    pub const fn new() -> Self {
        Self {
            slots: [Process::EMPTY; NPROC],
            next_pid: 1,
        }
    }

    /// All slots in fixed index order, including unused ones.
    pub fn iter(&self) -> core::slice::Iter<'_, Process> {
        self.slots.iter()
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Process; NPROC] {
        &mut self.slots
    }

    /// The live record carrying `pid`.
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.slots.iter().find(|p| p.is_live() && p.pid == pid)
    }

    /// Number of records whose state is in `states`.
    pub fn count(&self, states: StateSet) -> usize {
        self.slots.iter().filter(|p| p.state.is_in(states)).count()
    }

    fn index_of(&self, pid: Pid) -> KResult<usize> {
        self.slots
            .iter()
            .position(|p| p.is_live() && p.pid == pid)
            .ok_or(KernelError::NotFound)
    }

    fn get_mut(&mut self, pid: Pid) -> KResult<&mut Process> {
        let idx = self.index_of(pid)?;
        Ok(&mut self.slots[idx])
    }

    /// Claim a free slot for a new process (`Unused -> Embryo`).
    pub fn alloc(&mut self, parent: Option<Pid>) -> KResult<Pid> {
        let idx = self
            .slots
            .iter()
            .position(|p| p.state == ProcState::Unused)
            .ok_or(KernelError::ResourceExhausted)?;
        let next = self
            .next_pid
            .checked_add(1)
            .ok_or(KernelError::ResourceExhausted)?;

        let pid = Pid(self.next_pid);
        self.next_pid = next;
        self.slots[idx] = Process {
            pid,
            parent,
            state: ProcState::Embryo,
            ..Process::EMPTY
        };
        klog::debug!("proc: pid {} allocated in slot {}", pid, idx);
        Ok(pid)
    }

    fn transition(&mut self, pid: Pid, from: StateSet, to: ProcState) -> KResult<()> {
        let proc = self.get_mut(pid)?;
        if !proc.state.is_in(from) {
            klog::warn!(
                "proc: pid {} cannot go {} -> {}",
                pid,
                proc.state.as_str(),
                to.as_str()
            );
            return Err(KernelError::InvalidArgument);
        }
        klog::trace!("proc: pid {} {} -> {}", pid, proc.state.as_str(), to.as_str());
        proc.state = to;
        Ok(())
    }

    /// Setup finished (`Embryo -> Runnable`).
    pub fn make_runnable(&mut self, pid: Pid) -> KResult<()> {
        self.transition(pid, StateSet::EMBRYO, ProcState::Runnable)
    }

    /// Preempted or yielded (`Running -> Runnable`).
    pub fn yield_cpu(&mut self, pid: Pid) -> KResult<()> {
        self.transition(pid, StateSet::RUNNING, ProcState::Runnable)
    }

    /// Blocked (`Running | Runnable -> Sleeping`).
    pub fn sleep(&mut self, pid: Pid) -> KResult<()> {
        self.transition(pid, StateSet::ELIGIBLE, ProcState::Sleeping)
    }

    /// Woken (`Sleeping -> Runnable`).
    pub fn wakeup(&mut self, pid: Pid) -> KResult<()> {
        self.transition(pid, StateSet::SLEEPING, ProcState::Runnable)
    }

    /// Exited; stays a `Zombie` until the parent reaps it.
    pub fn exit(&mut self, pid: Pid) -> KResult<()> {
        self.transition(pid, StateSet::EXITABLE, ProcState::Zombie)
    }

    /// Reap one exited child of `parent` (`Zombie -> Unused`).
    ///
    /// `Ok(None)` means children exist but none has exited yet;
    /// `NotFound` means `parent` has no children at all. A child demoted by
    /// admission control is already `Unused` and is never reported here.
    pub fn wait(&mut self, parent: Pid) -> KResult<Option<Pid>> {
        let mut have_kids = false;
        for idx in 0..NPROC {
            let child = &self.slots[idx];
            if !child.is_live() || child.parent != Some(parent) {
                continue;
            }
            have_kids = true;
            if child.state == ProcState::Zombie {
                let pid = child.pid;
                self.release(idx);
                klog::debug!("proc: pid {} reaped by {}", pid, parent);
                return Ok(Some(pid));
            }
        }
        if have_kids {
            Ok(None)
        } else {
            Err(KernelError::NotFound)
        }
    }

    /// Free a slot. The pid stays in the slot until it is reallocated so
    /// that a late `kill` still finds it.
    fn release(&mut self, idx: usize) {
        let slot = &mut self.slots[idx];
        if slot.state == ProcState::Unused {
            panic!("proc: double free of slot {} (pid {})", idx, slot.pid);
        }
        slot.state = ProcState::Unused;
        slot.parent = None;
        slot.wakeup_pending = false;
    }

    /// Admission-rejection teardown: any live state straight to `Unused`,
    /// skipping `Zombie` and the parent's `wait`.
    pub fn force_unused(&mut self, pid: Pid) -> KResult<()> {
        let idx = self.index_of(pid)?;
        klog::warn!(
            "proc: pid {} forced {} -> unused, parent not notified",
            pid,
            self.slots[idx].state.as_str()
        );
        self.release(idx);
        Ok(())
    }

    /// Set the sticky kill flag; a sleeping target is made runnable so it
    /// reaches its next checkpoint.
    pub fn kill(&mut self, pid: Pid) -> KResult<()> {
        let proc = self
            .slots
            .iter_mut()
            .find(|p| p.pid == pid && p.pid != Pid(0))
            .ok_or(KernelError::NotFound)?;
        proc.killed = true;
        if proc.state == ProcState::Sleeping {
            proc.state = ProcState::Runnable;
        }
        klog::debug!("proc: pid {} killed", pid);
        Ok(())
    }

    // ── Scheduling parameters ───────────────────────────────────

    /// Record a new policy and stamp the arrival tick. Admission is the
    /// caller's job (see `Kernel::set_policy`).
    pub fn set_policy(&mut self, pid: Pid, policy: Policy, now: u64) -> KResult<()> {
        let proc = self.get_mut(pid)?;
        proc.policy = policy;
        proc.arrival_time = now;
        klog::debug!("proc: pid {} policy {} arrival {}", pid, policy, now);
        Ok(())
    }

    pub fn set_execution_time(&mut self, pid: Pid, ticks: u32) -> KResult<()> {
        self.get_mut(pid)?.execution_time = ticks;
        Ok(())
    }

    /// Set the RMS rate class; also clears `killed`.
    pub fn set_rate(&mut self, pid: Pid, rate: u32) -> KResult<()> {
        if !(RATE_MIN..=RATE_MAX).contains(&rate) {
            return Err(KernelError::InvalidArgument);
        }
        let proc = self.get_mut(pid)?;
        proc.rate = rate;
        proc.killed = false;
        Ok(())
    }

    /// Set the relative EDF deadline; also clears `killed`.
    pub fn set_deadline(&mut self, pid: Pid, deadline: u32) -> KResult<()> {
        if deadline == 0 {
            return Err(KernelError::InvalidArgument);
        }
        let proc = self.get_mut(pid)?;
        proc.deadline = deadline;
        proc.killed = false;
        Ok(())
    }

    // ── Park support ────────────────────────────────────────────

    /// Consume a wake-up posted while `pid` was not parked.
    pub(crate) fn take_wakeup(&mut self, pid: Pid) -> bool {
        match self.get_mut(pid) {
            Ok(proc) => core::mem::take(&mut proc.wakeup_pending),
            Err(_) => false,
        }
    }

    /// Wake a sleeping `pid`, or leave a wake-up for its next park.
    pub(crate) fn post_wakeup(&mut self, pid: Pid) -> KResult<()> {
        let proc = self.get_mut(pid)?;
        if proc.state == ProcState::Sleeping {
            proc.state = ProcState::Runnable;
        } else {
            proc.wakeup_pending = true;
        }
        Ok(())
    }

    /// Print a process listing (pid, state, policy) to the kernel log.
    pub fn dump(&self) {
        for proc in self.slots.iter().filter(|p| p.is_live()) {
            klog::info!("{} {} {}", proc.pid, proc.state.as_str(), proc.policy);
        }
    }
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}
