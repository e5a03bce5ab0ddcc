use std::sync::Mutex;
use std::thread;

use rtk_kernel::sync::spinlock::SpinLockGuard;
use rtk_kernel::task::process::{Pid, Policy, ProcTable, StateSet};
use rtk_kernel::task::scheduler::{Cpu, Round, Scheduler};
use rtk_kernel::Kernel;

/// A core whose processes run to completion as soon as they are switched to.
struct RunToExit<'a> {
    kernel: &'a Kernel,
    ran: &'a Mutex<Vec<Pid>>,
}

impl Cpu for RunToExit<'_> {
    fn switch_to(&self, pid: Pid) {
        self.ran.lock().unwrap().push(pid);
        self.kernel.procs.lock().exit(pid).unwrap();
    }

    fn sched(&self, _held: SpinLockGuard<'_, ProcTable>) {}
}

fn drain(kernel: &Kernel, sched: &Scheduler, cpu: &RunToExit<'_>) {
    while kernel.procs.lock().count(StateSet::ELIGIBLE) > 0 {
        if sched.run_once(kernel, cpu) == Round::Idle {
            thread::yield_now();
        }
    }
}

#[test]
fn realtime_classes_run_before_round_robin() {
    let kernel = Kernel::new();
    let rr = kernel.spawn(None).unwrap();
    let late = kernel.spawn(None).unwrap();
    let early = kernel.spawn(None).unwrap();
    kernel.set_deadline(late, 40).unwrap();
    kernel.set_deadline(early, 10).unwrap();
    kernel.set_policy(late, Policy::Edf).unwrap();
    kernel.set_policy(early, Policy::Edf).unwrap();

    let ran = Mutex::new(Vec::new());
    let cpu = RunToExit { kernel: &kernel, ran: &ran };
    drain(&kernel, &Scheduler::new(), &cpu);

    assert_eq!(*ran.lock().unwrap(), vec![early, late, rr]);
}

#[test]
fn two_cores_never_run_the_same_process_twice() {
    let kernel = Kernel::new();
    let pids: Vec<Pid> = (0..40).map(|_| kernel.spawn(None).unwrap()).collect();
    let ran = Mutex::new(Vec::new());
    let schedulers = [Scheduler::new(), Scheduler::new()];

    thread::scope(|s| {
        for sched in &schedulers {
            let (kernel, ran) = (&kernel, &ran);
            s.spawn(move || drain(kernel, sched, &RunToExit { kernel, ran }));
        }
    });

    let mut ran = ran.into_inner().unwrap();
    ran.sort();
    assert_eq!(ran, pids);
    let total: u64 = schedulers.iter().map(|s| s.rounds() - s.idle_rounds()).sum();
    assert_eq!(total, pids.len() as u64);
}
