//! Shared console adapter.
//!
//! Implements [`log::Log`] by writing one line per record to stderr. The
//! coordinator installs it once per process; worker contexts reach it by
//! forwarding their diagnostics over the channel. Each record is written
//! under the stderr lock so lines from different threads never interleave.

use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Adapter that prints every enabled record to the console.
pub struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    pub const fn new(level: LevelFilter) -> Self {
        Self { level }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut out = std::io::stderr().lock();
        let _ = writeln!(out, "{:<5} | {}", record.level(), record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install a [`ConsoleLogger`] as the process-wide `log` backend.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(ConsoleLogger::new(level)))?;
    log::set_max_level(level);
    Ok(())
}
