//! Per call-site logging handle

use crate::Level;
use crate::service::Shared;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Logging handle for a call site and the operation in progress there.
///
/// Created through [`LogService::new_context`](crate::LogService::new_context).
/// Contexts are immutable and may be cloned or shared across threads freely;
/// only the submission path inside the service is synchronised.
#[derive(Clone)]
pub struct LogContext {
    shared: Arc<Shared>,
    site: String,
    operation: String,
}

macro_rules! level_methods {
    ($($level:ident, $plain:ident, $detailed:ident, $doc:literal;)*) => {
        $(
            #[doc = $doc]
            #[inline]
            pub fn $plain(&self, message: &str) {
                self.log(Level::$level, message, "");
            }

            #[doc = $doc]
            ///
            /// `details` carries supplementary information in its own field.
            #[inline]
            pub fn $detailed(&self, message: &str, details: &str) {
                self.log(Level::$level, message, details);
            }
        )*
    };
}

impl LogContext {
    pub(crate) const fn new(shared: Arc<Shared>, site: String, operation: String) -> Self {
        Self {
            shared,
            site,
            operation,
        }
    }

    /// Call site, as written to the `site` field
    #[must_use]
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Operation, as written to the `operation` field
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Log `message` and `details` at `level`.
    ///
    /// Sink failures are never surfaced here; they are handled by the service.
    #[inline]
    pub fn log(&self, level: Level, message: &str, details: &str) {
        self.shared
            .submit(&self.site, &self.operation, level, message, details);
    }

    level_methods! {
        Trace, trace, trace_with_details, "Log the most granular information about system state.";
        Debug, debug, debug_with_details, "Log fairly granular information about system state.";
        Info, info, info_with_details, "Log general information describing system state.";
        Warn, warn, warn_with_details, "Log a potentially harmful situation of interest.";
        Error, error, error_with_details, "Log an event preventing normal execution that still lets the service continue.";
        Fatal, fatal, fatal_with_details, "Log the most severe events, likely to have caused the service to terminate.";
    }
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogContext")
            .field("site", &self.site)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

/// Bytes written to a context become one Trace entry each, so a context can
/// stand in wherever an [`io::Write`] is expected.
impl io::Write for &LogContext {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let message = String::from_utf8_lossy(buf);
        self.trace(message.trim_end_matches(['\r', '\n']));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for LogContext {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
