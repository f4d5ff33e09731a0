/*
 * Kernel Logging
 *
 * Backend for the `log` facade when the kernel runs hosted. Records go to
 * stderr as "[LEVEL] message", the same shape the kernel's serial console
 * logger uses.
 */

use log::{LevelFilter, Metadata, Record, SetLoggerError};

/// Logger writing to stderr
struct KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger;

/// Install the logger and set the maximum level.
///
/// Fails if another logger is already installed; the level is left alone in
/// that case.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
