//! In-kernel parker: blocking receive on top of the process table.
//!
//! `park(pid)` marks the caller `Sleeping` and hands the CPU back to the
//! scheduler; `unpark(pid)` makes it `Runnable` again. The table lock is
//! held from the state change until `Cpu::sched` has switched the caller
//! out, so a concurrent `unpark` cannot make it runnable on another core
//! while it is still on this one. A wake-up that
//! arrives before the caller went to sleep is remembered on the PCB and
//! consumed by the next `park`, so no wake-up is lost between "queue is
//! empty" and "asleep".

use crate::sync::park::Parker;
use crate::sync::spinlock::SpinLock;
use crate::task::process::{Pid, ProcTable};
use crate::task::scheduler::Cpu;

pub struct SleepParker<'a, C: Cpu> {
    procs: &'a SpinLock<ProcTable>,
    cpu: &'a C,
}

impl<'a, C: Cpu> SleepParker<'a, C> {
    pub fn new(procs: &'a SpinLock<ProcTable>, cpu: &'a C) -> Self {
        Self { procs, cpu }
    }
}

impl<C: Cpu> Parker for SleepParker<'_, C> {
    fn park(&self, pid: Pid) {
        let mut procs = self.procs.lock();
        if procs.take_wakeup(pid) {
            return;
        }
        if let Err(e) = procs.sleep(pid) {
            klog::warn!("park: pid {} cannot sleep: {}", pid, e);
            return;
        }
        self.cpu.sched(procs);
    }

    fn unpark(&self, pid: Pid) {
        if let Err(e) = self.procs.lock().post_wakeup(pid) {
            klog::debug!("park: wake-up for pid {} dropped: {}", pid, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::spinlock::SpinLockGuard;
    use crate::task::process::ProcState;
    use crate::task::scheduler::pick_next;
    use core::cell::Cell;

    struct CountingCpu {
        scheds: Cell<u32>,
    }

    impl Cpu for CountingCpu {
        fn switch_to(&self, _pid: Pid) {}

        fn sched(&self, _held: SpinLockGuard<'_, ProcTable>) {
            self.scheds.set(self.scheds.get() + 1);
        }
    }

    fn running(procs: &SpinLock<ProcTable>) -> Pid {
        let mut table = procs.lock();
        let pid = table.alloc(None).unwrap();
        table.make_runnable(pid).unwrap();
        assert_eq!(pick_next(&mut table), Some(pid));
        pid
    }

    #[test]
    fn park_sleeps_and_unpark_wakes() {
        let procs = SpinLock::new(ProcTable::new());
        let cpu = CountingCpu { scheds: Cell::new(0) };
        let parker = SleepParker::new(&procs, &cpu);
        let pid = running(&procs);

        parker.park(pid);
        assert_eq!(cpu.scheds.get(), 1);
        assert_eq!(procs.lock().get(pid).unwrap().state, ProcState::Sleeping);

        parker.unpark(pid);
        assert_eq!(procs.lock().get(pid).unwrap().state, ProcState::Runnable);
    }

    #[test]
    fn early_unpark_is_not_lost() {
        let procs = SpinLock::new(ProcTable::new());
        let cpu = CountingCpu { scheds: Cell::new(0) };
        let parker = SleepParker::new(&procs, &cpu);
        let pid = running(&procs);

        parker.unpark(pid);
        parker.park(pid);
        assert_eq!(cpu.scheds.get(), 0);
        assert_eq!(procs.lock().get(pid).unwrap().state, ProcState::Running);
    }

    /// A core that, in the middle of switching the caller out, lets the
    /// other core try to wake and dispatch it.
    struct RacingCpu<'a> {
        procs: &'a SpinLock<ProcTable>,
        victim: Cell<Option<Pid>>,
        lock_was_free: Cell<Option<bool>>,
        state_at_switch: Cell<Option<ProcState>>,
    }

    impl Cpu for RacingCpu<'_> {
        fn switch_to(&self, _pid: Pid) {}

        fn sched(&self, held: SpinLockGuard<'_, ProcTable>) {
            let pid = self.victim.get().unwrap();
            self.state_at_switch.set(held.get(pid).map(|p| p.state));
            let attempt = self.procs.try_lock().map(|mut table| {
                table.post_wakeup(pid).unwrap();
                pick_next(&mut table)
            });
            self.lock_was_free.set(Some(attempt.is_some()));
            drop(held);
        }
    }

    #[test]
    fn sleeper_cannot_be_dispatched_before_it_switches_out() {
        let procs = SpinLock::new(ProcTable::new());
        let cpu = RacingCpu {
            procs: &procs,
            victim: Cell::new(None),
            lock_was_free: Cell::new(None),
            state_at_switch: Cell::new(None),
        };
        let parker = SleepParker::new(&procs, &cpu);
        let pid = running(&procs);
        cpu.victim.set(Some(pid));

        parker.park(pid);
        assert_eq!(cpu.state_at_switch.get(), Some(ProcState::Sleeping));
        // The table was still locked: the other core could not wake it.
        assert_eq!(cpu.lock_was_free.get(), Some(false));
        assert!(!procs.is_locked());

        parker.unpark(pid);
        assert_eq!(pick_next(&mut procs.lock()), Some(pid));
        assert_eq!(pick_next(&mut procs.lock()), None);
    }
}
