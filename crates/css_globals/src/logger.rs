//! Pluggable diagnostics sink.

use log::{debug, error, info, warn};

/// Log severity levels understood by a [`Logger`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Where a binding reports scan problems. Mirrors the `info/debug/warn/error`
/// surface of a browser console.
pub trait Logger {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// The default sink: forwards to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    #[inline]
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!("[CSSGlobalProperties] {message}"),
            LogLevel::Info => info!("[CSSGlobalProperties] {message}"),
            LogLevel::Warn => warn!("[CSSGlobalProperties] {message}"),
            LogLevel::Error => error!("[CSSGlobalProperties] {message}"),
        }
    }
}
