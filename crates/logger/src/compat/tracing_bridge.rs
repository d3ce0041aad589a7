//! Bridge from tracing to a [`LogContext`]

use crate::{Level, LogContext};
use std::fmt::Write as _;
use tracing::{Event, Subscriber, field::Visit};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// A tracing layer that forwards events to a log context.
///
/// The event's `message` becomes `msg`; every other field, along with the
/// enclosing span names, is written to `details` as `key=value` pairs.
/// Events emitted by this crate itself are skipped so a failing sink cannot
/// feed its own diagnostics back into itself.
#[derive(Debug, Clone)]
pub struct TracingBridge {
    context: LogContext,
}

impl TracingBridge {
    /// Create a new tracing bridge
    #[must_use]
    pub const fn new(context: LogContext) -> Self {
        Self { context }
    }
}

impl<S> Layer<S> for TracingBridge
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }

        let level = match *metadata.level() {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::TRACE => Level::Trace,
        };

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                visitor.push_pair("span", &spans.join("::"));
            }
        }

        self.context.log(level, &visitor.message, &visitor.details);
    }
}

/// Visitor splitting the message from the remaining fields
#[derive(Default)]
struct FieldVisitor {
    message: String,
    details: String,
}

impl FieldVisitor {
    fn push_pair(&mut self, name: &str, value: &dyn std::fmt::Display) {
        if !self.details.is_empty() {
            self.details.push(' ');
        }
        let _ = write!(self.details, "{name}={value}");
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_pair(field.name(), &value);
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_pair(field.name(), &format_args!("{value:?}"));
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push_pair(field.name(), &value);
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push_pair(field.name(), &value);
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push_pair(field.name(), &value);
    }
}

/// Install a global subscriber that forwards all tracing events to `context`.
///
/// # Example
/// ```no_run
/// use proven_logger::{LogService, ServiceContext, compat::init_tracing_bridge};
///
/// let service = LogService::initialize(std::io::stdout(), ServiceContext::default()).unwrap();
/// init_tracing_bridge(service.new_context("tracing", "bridge")).expect("Failed to set tracing bridge");
/// ```
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn init_tracing_bridge(context: LogContext) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::prelude::*;

    // Not `try_init`: that would also claim the `log` global logger, which
    // belongs to the log bridge.
    let subscriber = tracing_subscriber::registry().with(TracingBridge::new(context));
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
