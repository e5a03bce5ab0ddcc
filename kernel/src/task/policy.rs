//! Administrative entry points for scheduling parameters.
//!
//! Called by the syscall layer after argument decoding. Each one runs under
//! a single hold of the process table lock.

use crate::Kernel;
use crate::error::KResult;
use crate::task::admission;
use crate::task::process::{Pid, Policy};

impl Kernel {
    /// Assign `policy` to `pid`, stamp its arrival tick, and run the class's
    /// admission test.
    ///
    /// On rejection the candidate has already been demoted to `Unused`; it
    /// is additionally marked killed so any code still holding it on a CPU
    /// stops at its next checkpoint.
    pub fn set_policy(&self, pid: Pid, policy: Policy) -> KResult<()> {
        let now = self.clock.now();
        let mut procs = self.procs.lock();
        procs.set_policy(pid, policy, now)?;

        let verdict = match policy {
            Policy::RoundRobin => Ok(()),
            Policy::Edf => admission::edf_admit(&mut procs, pid),
            Policy::Rms => admission::rms_admit(&mut procs, pid),
        };
        if verdict.is_err() {
            let _ = procs.kill(pid);
        }
        verdict
    }

    pub fn set_execution_time(&self, pid: Pid, ticks: u32) -> KResult<()> {
        self.procs.lock().set_execution_time(pid, ticks)
    }

    pub fn set_rate(&self, pid: Pid, rate: u32) -> KResult<()> {
        self.procs.lock().set_rate(pid, rate)
    }

    pub fn set_deadline(&self, pid: Pid, deadline: u32) -> KResult<()> {
        self.procs.lock().set_deadline(pid, deadline)
    }
}

#[cfg(test)]
mod tests {
    use crate::Kernel;
    use crate::error::KernelError;
    use crate::task::process::{Policy, ProcState};

    #[test]
    fn rejected_candidate_is_demoted_and_killed() {
        let kernel = Kernel::new();
        for _ in 0..2 {
            let pid = kernel.spawn(None).unwrap();
            kernel.set_execution_time(pid, 5).unwrap();
            kernel.set_deadline(pid, 10).unwrap();
            assert_eq!(kernel.set_policy(pid, Policy::Edf), Ok(()));
        }

        let extra = kernel.spawn(None).unwrap();
        kernel.set_execution_time(extra, 5).unwrap();
        kernel.set_deadline(extra, 10).unwrap();
        assert_eq!(
            kernel.set_policy(extra, Policy::Edf),
            Err(KernelError::AdmissionRejected)
        );

        let procs = kernel.procs.lock();
        let slot = procs.iter().find(|p| p.pid == extra).unwrap();
        assert_eq!(slot.state, ProcState::Unused);
        assert!(slot.killed);
    }

    #[test]
    fn arrival_time_comes_from_the_clock() {
        let kernel = Kernel::new();
        let pid = kernel.spawn(None).unwrap();
        kernel.clock.advance(42);
        kernel.set_policy(pid, Policy::RoundRobin).unwrap();
        assert_eq!(kernel.procs.lock().get(pid).unwrap().arrival_time, 42);
    }

    #[test]
    fn unknown_pid() {
        let kernel = Kernel::new();
        assert_eq!(
            kernel.set_policy(crate::task::process::Pid(7), Policy::Rms),
            Err(KernelError::NotFound)
        );
    }
}
