#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread::{self, Thread};

use rtk_kernel::sync::park::Parker;
use rtk_kernel::syscall::{self, Syscall};
use rtk_kernel::task::process::Pid;
use rtk_kernel::Kernel;

/// Parks host threads, one thread per pid. `std::thread::park` already
/// keeps an unpark token, which gives the no-lost-wake-up contract.
#[derive(Default)]
pub struct ThreadParker {
    threads: Mutex<HashMap<Pid, Thread>>,
}

impl ThreadParker {
    /// Bind `pid` to the calling thread.
    pub fn register(&self, pid: Pid) {
        self.threads.lock().unwrap().insert(pid, thread::current());
    }
}

impl Parker for ThreadParker {
    fn park(&self, _pid: Pid) {
        thread::park();
    }

    fn unpark(&self, pid: Pid) {
        if let Some(t) = self.threads.lock().unwrap().get(&pid) {
            t.unpark();
        }
    }
}

pub fn raw(pid: Pid) -> i64 {
    i64::from(pid.0)
}

pub fn sys(kernel: &Kernel, caller: Pid, call: Syscall<'_>, parker: &ThreadParker) -> i64 {
    syscall::dispatch(kernel, caller, call, parker)
}

pub fn send(kernel: &Kernel, parker: &ThreadParker, from: Pid, to: Pid, msg: &str) -> i64 {
    sys(
        kernel,
        from,
        Syscall::Send { sender: raw(from), receiver: raw(to), msg: msg.as_bytes() },
        parker,
    )
}

/// Blocking receive for `me`; returns the payload text.
pub fn recv(kernel: &Kernel, parker: &ThreadParker, me: Pid) -> String {
    let mut buf = [0u8; 8];
    assert_eq!(sys(kernel, me, Syscall::Recv { buf: &mut buf }, parker), 0);
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}
