//! What `print_count` and `ps` actually write to the kernel log.

use std::fmt;
use std::sync::Mutex;

use rtk_kernel::syscall::{dispatch, Syscall};
use rtk_kernel::sync::park::BusyWait;
use rtk_kernel::Kernel;

struct Capture {
    lines: Mutex<Vec<String>>,
}

impl klog::Sink for Capture {
    fn write(&self, level: klog::Level, args: fmt::Arguments) {
        if level == klog::Level::Info {
            self.lines.lock().unwrap().push(args.to_string());
        }
    }
}

static CAPTURE: Capture = Capture { lines: Mutex::new(Vec::new()) };

fn take_lines() -> Vec<String> {
    std::mem::take(&mut *CAPTURE.lines.lock().unwrap())
}

#[test]
fn counters_and_process_listing_reach_the_log() {
    klog::set_sink(&CAPTURE);
    klog::set_max_level(klog::Level::Info);

    let kernel = Kernel::new();
    let a = kernel.spawn(None).unwrap();
    let b = kernel.spawn(Some(a)).unwrap();
    let call = |c: Syscall<'_>| dispatch(&kernel, a, c, &BusyWait);

    // Tracing off: the report is empty.
    call(Syscall::GetPid);
    take_lines();
    assert_eq!(call(Syscall::PrintCount), 0);
    assert!(take_lines().is_empty());

    call(Syscall::Toggle);
    call(Syscall::Uptime);
    call(Syscall::Add { a: 1, b: 2 });
    call(Syscall::Add { a: 3, b: 4 });
    call(Syscall::Send { sender: 1, receiver: 2, msg: b"hi" });
    call(Syscall::GetPid);
    take_lines();
    assert_eq!(call(Syscall::PrintCount), 0);
    assert_eq!(
        take_lines(),
        vec![
            "sys_add 2",
            "sys_getpid 1",
            "sys_print_count 1",
            "sys_send 1",
            "sys_uptime 1",
        ]
    );

    call(Syscall::Toggle);
    take_lines();
    assert_eq!(call(Syscall::PrintCount), 0);
    assert!(take_lines().is_empty());

    assert_eq!(call(Syscall::Ps), 0);
    assert_eq!(
        take_lines(),
        vec![format!("{} runble rr", a), format!("{} runble rr", b)]
    );

    klog::clear_sink();
}
