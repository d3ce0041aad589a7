//! Bridge from the `log` crate to a [`LogContext`]

use crate::{Level, LogContext};
use log::{Log, Metadata, Record as LogRecord};
use std::borrow::Cow;
use std::fmt::Write as _;

/// Wrapper implementing the log crate's `Log` trait on top of a context
#[derive(Debug, Clone)]
pub struct LogBridge {
    context: LogContext,
}

impl LogBridge {
    /// Create a new log bridge
    #[must_use]
    pub const fn new(context: LogContext) -> Self {
        Self { context }
    }
}

impl Log for LogBridge {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        // Severity is recorded, never filtered.
        true
    }

    fn log(&self, record: &LogRecord) {
        let message = record
            .args()
            .as_str()
            .map_or_else(|| Cow::Owned(record.args().to_string()), Cow::Borrowed);

        let mut details = String::with_capacity(64);
        let _ = write!(details, "target={}", record.target());
        if let (Some(file), Some(line)) = (record.file(), record.line()) {
            let _ = write!(details, " location={file}:{line}");
        }

        self.context.log(map_level(record.level()), &message, &details);
    }

    fn flush(&self) {}
}

/// Map log levels to our levels
const fn map_level(level: log::Level) -> Level {
    match level {
        log::Level::Error => Level::Error,
        log::Level::Warn => Level::Warn,
        log::Level::Info => Level::Info,
        log::Level::Debug => Level::Debug,
        log::Level::Trace => Level::Trace,
    }
}

/// Route every `log` macro call in the process to `context`.
///
/// # Example
/// ```no_run
/// use proven_logger::{LogService, ServiceContext, compat::init_log_bridge};
///
/// let service = LogService::initialize(std::io::stdout(), ServiceContext::default()).unwrap();
/// init_log_bridge(service.new_context("log crate", "bridge")).expect("Failed to set log bridge");
/// ```
///
/// # Errors
///
/// Returns an error if a global logger has already been installed.
pub fn init_log_bridge(context: LogContext) -> Result<(), log::SetLoggerError> {
    // log::set_logger requires 'static
    let bridge = Box::leak(Box::new(LogBridge::new(context)));

    log::set_logger(bridge)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
