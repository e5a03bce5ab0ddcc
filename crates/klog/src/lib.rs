//! Kernel logging subsystem.
//!
//! Records are routed to a single registered [`Sink`] (the serial console on
//! hardware, an in-memory capture under test). Nothing is allocated: the
//! payload travels as `fmt::Arguments` all the way to the sink.
#![cfg_attr(not(test), no_std)]

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use spin::RwLock;

mod bridge;

pub use bridge::init_log_bridge;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => " INFO",
            Level::Warn => " WARN",
            Level::Error => "ERROR",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Level::Trace => "\x1b[90m", // Gray
            Level::Debug => "\x1b[36m", // Cyan
            Level::Info => "\x1b[32m",  // Green
            Level::Warn => "\x1b[33m",  // Yellow
            Level::Error => "\x1b[31m", // Red
        }
    }

    fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            _ => Level::Error,
        }
    }
}

// ── Sink ────────────────────────────────────────────────────────

/// Destination for log records.
///
/// Implementations must be callable from any core; the logger does not
/// serialize calls on their behalf.
pub trait Sink: Sync {
    fn write(&self, level: Level, args: fmt::Arguments);
}

static SINK: RwLock<Option<&'static dyn Sink>> = RwLock::new(None);

/// Records strictly below this level are dropped.
static MAX_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Install the sink that receives every enabled record.
pub fn set_sink(sink: &'static dyn Sink) {
    *SINK.write() = Some(sink);
}

/// Remove the current sink; records are discarded until a new one is set.
pub fn clear_sink() {
    *SINK.write() = None;
}

/// Set the runtime level filter.
pub fn set_max_level(level: Level) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
    ::log::set_max_level(bridge::level_filter(level));
}

/// Current runtime level filter.
pub fn max_level() -> Level {
    Level::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

/// Would a record at `level` reach the sink?
#[inline]
pub fn enabled(level: Level) -> bool {
    level >= max_level()
}

/// Log a message with a specific level
pub fn log(level: Level, args: fmt::Arguments) {
    if !enabled(level) {
        return;
    }
    if let Some(sink) = *SINK.read() {
        sink.write(level, args);
    }
}

/// Render one record the way the serial console prints it:
/// colored `[LEVEL]` tag, reset, message, newline.
pub fn write_record<W: fmt::Write>(out: &mut W, level: Level, args: fmt::Arguments) -> fmt::Result {
    out.write_str(level.color())?;
    out.write_str("[")?;
    out.write_str(level.as_str())?;
    out.write_str("]\x1b[0m ")?;
    out.write_fmt(args)?;
    out.write_str("\n")
}

/// Log at TRACE level
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Trace, format_args!($($arg)*))
    };
}

/// Log at DEBUG level
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Debug, format_args!($($arg)*))
    };
}

/// Log at INFO level
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Info, format_args!($($arg)*))
    };
}

/// Log at WARN level
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Warn, format_args!($($arg)*))
    };
}

/// Log at ERROR level
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Error, format_args!($($arg)*))
    };
}
