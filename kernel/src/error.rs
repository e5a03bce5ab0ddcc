//! Kernel error taxonomy and its syscall return codes.

use core::fmt;

/// Generic failure: bad argument or exhausted resource.
pub const ERR: i64 = -1;

/// Invalid argument on the scheduling surface (also admission failures).
pub const EINVAL: i64 = -22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Pid out of range, bad value, or a transition the state machine forbids.
    InvalidArgument,
    /// A bounded table or queue is full.
    ResourceExhausted,
    /// The utilization bound would be exceeded; the candidate was demoted.
    AdmissionRejected,
    /// No live process carries the requested pid.
    NotFound,
}

pub type KResult<T> = Result<T, KernelError>;

impl KernelError {
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelError::InvalidArgument => "invalid argument",
            KernelError::ResourceExhausted => "resource exhausted",
            KernelError::AdmissionRejected => "admission rejected",
            KernelError::NotFound => "no such process",
        }
    }

    /// Return code on the message-passing and process syscalls.
    pub fn ipc_errno(self) -> i64 {
        match self {
            KernelError::InvalidArgument | KernelError::ResourceExhausted => ERR,
            KernelError::AdmissionRejected | KernelError::NotFound => EINVAL,
        }
    }

    /// Return code on the scheduling-parameter syscalls.
    pub fn sched_errno(self) -> i64 {
        EINVAL
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
