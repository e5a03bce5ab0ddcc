//! Admission control: schedulability tests for the real-time classes.
//!
//! Both tests look at every `Runnable`/`Running` process of their class
//! (the candidate included, if it is in one of those states) and, when the
//! class no longer fits its utilization bound, demote the candidate straight
//! to `Unused`. Utilizations are integer percentages with truncating
//! division, exactly as the syscall ABI has always reported them.

use crate::config::{ROOT_PRECISION, UTILIZATION_CAP};
use crate::error::{KResult, KernelError};
use crate::task::process::{Pid, Policy, ProcTable, StateSet};

/// Σ `100 * execution_time / deadline` over eligible EDF processes.
///
/// A zero deadline cannot be met by any schedule; it saturates the sum.
pub fn edf_utilization(table: &ProcTable) -> u64 {
    table
        .iter()
        .filter(|p| p.policy == Policy::Edf && p.state.is_in(StateSet::ELIGIBLE))
        .map(|p| {
            (100 * u64::from(p.execution_time))
                .checked_div(u64::from(p.deadline))
                .unwrap_or(u64::MAX)
        })
        .fold(0u64, u64::saturating_add)
}

/// EDF test: reject when the class utilization exceeds 100%.
pub fn edf_admit(table: &mut ProcTable, candidate: Pid) -> KResult<()> {
    let sum = edf_utilization(table);
    if sum > UTILIZATION_CAP {
        klog::warn!(
            "admission: edf pid {} rejected, utilization {} > {}",
            candidate,
            sum,
            UTILIZATION_CAP
        );
        return reject(table, candidate);
    }
    klog::debug!("admission: edf pid {} admitted, utilization {}", candidate, sum);
    Ok(())
}

/// Eligible RMS processes and Σ `execution_time * rate` over them.
pub fn rms_utilization(table: &ProcTable) -> (usize, u64) {
    table
        .iter()
        .filter(|p| p.policy == Policy::Rms && p.state.is_in(StateSet::ELIGIBLE))
        .fold((0, 0u64), |(n, sum), p| {
            let demand = u64::from(p.execution_time) * u64::from(p.rate);
            (n + 1, sum.saturating_add(demand))
        })
}

/// `2^(1/n)` by bisection over `[0, 2]`, stopping once the bracket is no
/// wider than [`ROOT_PRECISION`]; returns the bracket midpoint.
pub fn nth_root_of_two(n: usize) -> f64 {
    let mut lower = 0.0f64;
    let mut upper = 2.0f64;
    while upper - lower > ROOT_PRECISION {
        let mid = lower + (upper - lower) / 2.0;
        let mut power = 1.0f64;
        for _ in 0..n {
            power *= mid;
        }
        if power > 2.0 {
            upper = mid;
        } else {
            lower = mid;
        }
    }
    (lower + upper) / 2.0
}

/// Liu–Layland bound `100 * n * (2^(1/n) - 1)`, truncated to an integer.
pub fn rms_bound(n: usize) -> u64 {
    (100.0 * n as f64 * (nth_root_of_two(n) - 1.0)) as u64
}

/// RMS test: reject when Σ `execution_time * rate` exceeds the bound for
/// the current number of eligible RMS processes.
pub fn rms_admit(table: &mut ProcTable, candidate: Pid) -> KResult<()> {
    let (n, sum) = rms_utilization(table);
    let bound = rms_bound(n);
    if sum > bound {
        klog::warn!(
            "admission: rms pid {} rejected, utilization {} > bound {} (n={})",
            candidate,
            sum,
            bound,
            n
        );
        return reject(table, candidate);
    }
    klog::debug!(
        "admission: rms pid {} admitted, utilization {} <= {} (n={})",
        candidate,
        sum,
        bound,
        n
    );
    Ok(())
}

fn reject(table: &mut ProcTable, candidate: Pid) -> KResult<()> {
    // The candidate may already be gone; the verdict stands either way.
    let _ = table.force_unused(candidate);
    Err(KernelError::AdmissionRejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::process::ProcState;

    fn edf(table: &mut ProcTable, exec: u32, deadline: u32) -> Pid {
        let pid = table.alloc(None).unwrap();
        table.make_runnable(pid).unwrap();
        table.set_execution_time(pid, exec).unwrap();
        table.set_deadline(pid, deadline).unwrap();
        table.set_policy(pid, Policy::Edf, 0).unwrap();
        pid
    }

    fn rms(table: &mut ProcTable, exec: u32, rate: u32) -> Pid {
        let pid = table.alloc(None).unwrap();
        table.make_runnable(pid).unwrap();
        table.set_execution_time(pid, exec).unwrap();
        table.set_rate(pid, rate).unwrap();
        table.set_policy(pid, Policy::Rms, 0).unwrap();
        pid
    }

    #[test]
    fn edf_accepts_full_utilization_then_rejects() {
        let mut table = ProcTable::new();
        let a = edf(&mut table, 5, 10);
        assert_eq!(edf_admit(&mut table, a), Ok(()));
        let b = edf(&mut table, 5, 10);
        assert_eq!(edf_admit(&mut table, b), Ok(()));
        assert_eq!(edf_utilization(&table), 100);

        let c = edf(&mut table, 5, 10);
        assert_eq!(edf_admit(&mut table, c), Err(KernelError::AdmissionRejected));
        assert!(table.get(c).is_none());
        assert_eq!(table.iter().find(|p| p.pid == c).unwrap().state, ProcState::Unused);
        assert_eq!(edf_utilization(&table), 100);
    }

    #[test]
    fn edf_division_truncates() {
        let mut table = ProcTable::new();
        // 100/3 = 33 each: 99 in total, admitted even though the real sum is 1.0.
        for _ in 0..3 {
            let pid = edf(&mut table, 1, 3);
            assert_eq!(edf_admit(&mut table, pid), Ok(()));
        }
        assert_eq!(edf_utilization(&table), 99);
    }

    #[test]
    fn edf_ignores_sleeping_and_other_classes() {
        let mut table = ProcTable::new();
        let sleeper = edf(&mut table, 10, 10);
        table.sleep(sleeper).unwrap();
        rms(&mut table, 10, 30);
        let pid = edf(&mut table, 9, 10);
        assert_eq!(edf_utilization(&table), 90);
        assert_eq!(edf_admit(&mut table, pid), Ok(()));
    }

    #[test]
    fn root_bisection_precision() {
        assert!((nth_root_of_two(2) - core::f64::consts::SQRT_2).abs() < ROOT_PRECISION);
        assert!((nth_root_of_two(1) - 2.0).abs() < ROOT_PRECISION);
        assert!(nth_root_of_two(1) < 2.0);
    }

    #[test]
    fn rms_bounds() {
        assert_eq!(rms_bound(0), 0);
        // The bisection stops just short of 2, so one process gets 99.
        assert_eq!(rms_bound(1), 99);
        assert_eq!(rms_bound(2), 82);
        assert_eq!(rms_bound(3), 77);
    }

    #[test]
    fn rms_two_processes_at_80_accepted() {
        let mut table = ProcTable::new();
        let a = rms(&mut table, 2, 20);
        assert_eq!(rms_admit(&mut table, a), Ok(()));
        let b = rms(&mut table, 4, 10);
        assert_eq!(rms_utilization(&table), (2, 80));
        assert_eq!(rms_admit(&mut table, b), Ok(()));
    }

    #[test]
    fn rms_two_processes_at_90_rejected() {
        let mut table = ProcTable::new();
        let a = rms(&mut table, 3, 20);
        assert_eq!(rms_admit(&mut table, a), Ok(()));
        let b = rms(&mut table, 3, 10);
        assert_eq!(rms_utilization(&table), (2, 90));
        assert_eq!(rms_admit(&mut table, b), Err(KernelError::AdmissionRejected));
        assert!(table.get(b).is_none());
        assert_eq!(rms_utilization(&table), (1, 60));
    }

    #[test]
    fn rms_single_process_at_100_rejected() {
        let mut table = ProcTable::new();
        let a = rms(&mut table, 5, 20);
        assert_eq!(rms_admit(&mut table, a), Err(KernelError::AdmissionRejected));
    }
}
