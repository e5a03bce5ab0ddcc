//! `log` facade → klog.
//!
//! Dependencies that log through the `log` crate end up on the same sink
//! as the kernel's own records.

use crate::Level;

struct Bridge;

static BRIDGE: Bridge = Bridge;

impl From<::log::Level> for Level {
    fn from(level: ::log::Level) -> Self {
        match level {
            ::log::Level::Trace => Level::Trace,
            ::log::Level::Debug => Level::Debug,
            ::log::Level::Info => Level::Info,
            ::log::Level::Warn => Level::Warn,
            ::log::Level::Error => Level::Error,
        }
    }
}

pub(crate) fn level_filter(level: Level) -> ::log::LevelFilter {
    match level {
        Level::Trace => ::log::LevelFilter::Trace,
        Level::Debug => ::log::LevelFilter::Debug,
        Level::Info => ::log::LevelFilter::Info,
        Level::Warn => ::log::LevelFilter::Warn,
        Level::Error => ::log::LevelFilter::Error,
    }
}

impl ::log::Log for Bridge {
    fn enabled(&self, metadata: &::log::Metadata) -> bool {
        crate::enabled(metadata.level().into())
    }

    fn log(&self, record: &::log::Record) {
        if self.enabled(record.metadata()) {
            crate::log(
                record.level().into(),
                format_args!("{}: {}", record.target(), record.args()),
            );
        }
    }

    fn flush(&self) {}
}

/// Route `log` crate records into klog.
///
/// Fails if another `log` backend was installed first.
pub fn init_log_bridge() -> Result<(), ::log::SetLoggerError> {
    ::log::set_logger(&BRIDGE)?;
    ::log::set_max_level(level_filter(crate::max_level()));
    Ok(())
}
