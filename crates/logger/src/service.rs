//! The log service: sink ownership, shared identity and drain lifecycle

use crate::config::{LogServiceConfig, LogServiceOptions};
use crate::delivery::{Fallback, InFlight, Pipeline, SinkWriter, report_dropped};
use crate::error::Result;
use crate::record::Timestamp;
use crate::serialize::{escape, serialize};
use crate::{Level, LogContext, LogDetail, LogEntry, ServiceContext};
use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, info};

/// Lifecycle state of a [`LogService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    /// Accepting submissions
    Active = 0,
    /// Flushing remaining submissions before shutdown
    Draining = 1,
    /// Terminal; submissions are reported on the fallback stream and dropped
    Stopped = 2,
}

impl ServiceState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Active,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

pub(crate) struct Shared {
    service: ServiceContext,
    options: LogServiceOptions,
    pipeline: Pipeline,
    in_flight: Arc<InFlight>,
    fallback: Fallback,
    state: AtomicU8,
}

impl Shared {
    fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Stamp, serialize and deliver one entry. Never fails towards the caller.
    pub(crate) fn submit(
        &self,
        site: &str,
        operation: &str,
        level: Level,
        message: &str,
        details: &str,
    ) {
        let timestamp = Timestamp::now(self.options.timestamp_format);
        let detail = LogDetail::new(level, timestamp.as_str(), message).with_details(details);
        let entry = LogEntry::new(&self.service, site, operation, detail);

        if self.state() == ServiceState::Stopped {
            report_dropped(
                &self.fallback,
                "log service is stopped; entry dropped",
                &serialize(&entry),
            );
            return;
        }

        self.in_flight.begin();
        self.pipeline.deliver(
            &entry,
            self.options.newline_delimited,
            &self.in_flight,
            &self.fallback,
        );
    }
}

/// Owns an output sink and hands out [`LogContext`]s that write to it.
///
/// A `LogService` is a cheap handle; clones share the same sink, buffers and
/// lifecycle. Every entry written through any of its contexts reaches the sink
/// whole, one at a time.
///
/// Shutdown is cooperative: stop producing entries, then call
/// [`finish`](Self::finish). The drain returns once no submission has been in
/// flight for the configured cancellation deadline. If producers keep logging
/// during that window the drain keeps waiting, so callers that need a hard
/// bound should apply their own timeout around it.
#[derive(Clone)]
pub struct LogService {
    shared: Arc<Shared>,
}

impl LogService {
    /// Start a log service writing to `sink` with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be started (see
    /// [`LogServiceBuilder::build`]).
    pub fn initialize<W>(sink: W, service_context: ServiceContext) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        LogServiceBuilder::new(sink, service_context).build()
    }

    /// Start a log service writing to `sink` with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the background writer
    /// cannot be spawned.
    pub fn initialize_with_options<W>(
        sink: W,
        service_context: ServiceContext,
        options: LogServiceOptions,
    ) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        LogServiceBuilder::new(sink, service_context)
            .options(options)
            .build()
    }

    /// Start a log service from a parsed [`LogServiceConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the background writer
    /// cannot be spawned.
    pub fn from_config<W>(sink: W, config: LogServiceConfig) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        Self::initialize_with_options(sink, config.service, config.options)
    }

    /// Create a builder for finer control, e.g. over the fallback stream
    pub fn builder<W>(sink: W, service_context: ServiceContext) -> LogServiceBuilder
    where
        W: Write + Send + 'static,
    {
        LogServiceBuilder::new(sink, service_context)
    }

    /// Create a logging context for a call site and operation.
    ///
    /// Both values are escaped once here rather than on every entry.
    #[must_use]
    pub fn new_context(&self, site: &str, operation: &str) -> LogContext {
        LogContext::new(
            self.shared.clone(),
            escape(site).into_owned(),
            escape(operation).into_owned(),
        )
    }

    /// The escaped identity written into every entry
    #[must_use]
    pub fn service_context(&self) -> &ServiceContext {
        &self.shared.service
    }

    /// Options this service runs with
    #[must_use]
    pub fn options(&self) -> &LogServiceOptions {
        &self.shared.options
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.shared.state()
    }

    /// Number of submissions that have started but not reached the sink yet
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.count()
    }

    /// Signal that the host is winding down. Idempotent and non-blocking.
    pub fn cancel(&self) {
        if self
            .shared
            .state
            .compare_exchange(
                ServiceState::Active as u8,
                ServiceState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            info!(
                deadline_ms = self.shared.options.cancellation_deadline.as_millis(),
                "log service draining"
            );
        }
    }

    /// Block until submissions have been quiet for the cancellation deadline,
    /// then stop the service.
    pub fn wait(&self) {
        if self.state() == ServiceState::Stopped {
            return;
        }

        self.shared
            .in_flight
            .wait_quiet(self.shared.options.cancellation_deadline);
        self.shared.pipeline.stop();

        if self.shared.state.swap(ServiceState::Stopped as u8, Ordering::AcqRel)
            != ServiceState::Stopped as u8
        {
            info!("log service drained");
        }
    }

    /// [`cancel`](Self::cancel) followed by [`wait`](Self::wait)
    pub fn finish(&self) {
        self.cancel();
        self.wait();
    }
}

impl fmt::Debug for LogService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogService")
            .field("service", &self.shared.service)
            .field("options", &self.shared.options)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Builder for [`LogService`]
pub struct LogServiceBuilder {
    sink: Box<dyn Write + Send>,
    service_context: ServiceContext,
    options: LogServiceOptions,
    fallback: Box<dyn Write + Send>,
}

impl LogServiceBuilder {
    /// Start building a service for `sink`
    pub fn new<W>(sink: W, service_context: ServiceContext) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            sink: Box::new(sink),
            service_context,
            options: LogServiceOptions::default(),
            fallback: Box::new(std::io::stderr()),
        }
    }

    /// Set the service options
    #[must_use]
    pub fn options(mut self, options: LogServiceOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the diagnostic stream used when the sink fails (stderr by default)
    #[must_use]
    pub fn fallback<W>(mut self, fallback: W) -> Self
    where
        W: Write + Send + 'static,
    {
        self.fallback = Box::new(fallback);
        self
    }

    /// Escape the service identity, allocate buffers and start delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the background writer
    /// thread for queued delivery cannot be spawned.
    pub fn build(self) -> Result<LogService> {
        self.options.validate()?;

        let service = self.service_context.escaped();
        let fallback: Fallback = Arc::new(Mutex::new(self.fallback));
        let in_flight = Arc::new(InFlight::new());

        let writer = SinkWriter::new(self.sink, fallback.clone(), service.clone(), &self.options);
        let pipeline = Pipeline::start(writer, &self.options, in_flight.clone())?;

        debug!(
            delivery = ?self.options.delivery,
            service = %service.service_name,
            "log service started"
        );

        Ok(LogService {
            shared: Arc::new(Shared {
                service,
                options: self.options,
                pipeline,
                in_flight,
                fallback,
                state: AtomicU8::new(ServiceState::Active as u8),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Delivery;
    use std::io;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Vec<u8>>>>);

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("sink unavailable"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn quick_options() -> LogServiceOptions {
        LogServiceOptions::builder()
            .cancellation_deadline(Duration::from_millis(5))
            .build()
    }

    #[test]
    fn test_state_transitions() {
        let service =
            LogService::initialize_with_options(io::sink(), ServiceContext::default(), quick_options())
                .unwrap();

        assert_eq!(service.state(), ServiceState::Active);
        service.cancel();
        assert_eq!(service.state(), ServiceState::Draining);
        service.cancel();
        assert_eq!(service.state(), ServiceState::Draining);
        service.wait();
        assert_eq!(service.state(), ServiceState::Stopped);
        service.finish();
        assert_eq!(service.state(), ServiceState::Stopped);
    }

    #[test]
    fn test_service_context_escaped_once() {
        let service = LogService::initialize(
            io::sink(),
            ServiceContext::new("a\"b", "sys", "svc", "1"),
        )
        .unwrap();

        assert_eq!(service.service_context().environment, "a\\\"b");
    }

    #[test]
    fn test_submissions_after_stop_go_to_fallback() {
        let sink = Recorder::default();
        let fallback = Recorder::default();
        let service = LogService::builder(sink.clone(), ServiceContext::default())
            .options(quick_options())
            .fallback(fallback.clone())
            .build()
            .unwrap();

        let log = service.new_context("site", "op");
        service.finish();
        log.info("too late");

        assert!(sink.0.lock().is_empty());
        let diagnostics: Vec<u8> = fallback.0.lock().concat();
        let diagnostics = String::from_utf8(diagnostics).unwrap();
        assert!(diagnostics.contains("stopped"));
        assert!(diagnostics.contains("too late"));
    }

    #[test]
    #[traced_test]
    fn test_sink_failure_is_traced() {
        let service = LogService::builder(Broken, ServiceContext::default())
            .options(quick_options())
            .fallback(io::sink())
            .build()
            .unwrap();

        service.new_context("site", "op").error("boom");
        service.finish();

        assert!(logs_contain("log sink write failed"));
        assert!(logs_contain("sink unavailable"));
    }

    #[test]
    #[traced_test]
    fn test_queued_drain_is_traced() {
        let options = LogServiceOptions::builder()
            .cancellation_deadline(Duration::from_millis(5))
            .delivery(Delivery::Queued { capacity: 4 })
            .build();
        let service = LogService::builder(Broken, ServiceContext::default())
            .options(options)
            .fallback(io::sink())
            .build()
            .unwrap();

        service.new_context("site", "op").warn("boom");
        service.finish();

        assert!(logs_contain("log service draining"));
        assert!(logs_contain("log service drained"));
    }
}
