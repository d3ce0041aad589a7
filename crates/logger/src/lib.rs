//! Low-allocation structured JSON logging.
//!
//! A [`LogService`] owns an output sink (anything implementing
//! [`std::io::Write`]: a file, a socket, an in-memory buffer) together with the
//! identity of the running service. [`LogContext`]s created from it carry a
//! call site and operation, and render each log call as one flat JSON object:
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.123456789Z","environment":"prod","system_name":"billing","service_name":"invoicer","service_instance_id":"1","site":"api","operation":"create invoice","level":"300","severity":"info","msg":"created","details":""}
//! ```
//!
//! Entries are built by direct token concatenation into a reusable buffer.
//! Many threads may log through the same service; each entry reaches the sink
//! whole, and each thread's entries arrive in the order it issued them.
//!
//! ```no_run
//! use proven_logger::{LogService, ServiceContext};
//!
//! let service = LogService::initialize(
//!     std::io::stdout(),
//!     ServiceContext::new("dev", "billing", "invoicer", "1"),
//! )?;
//!
//! let log = service.new_context("api", "create invoice");
//! log.info("created");
//! log.warn_with_details("slow upstream", "took 1200ms");
//!
//! service.finish();
//! # Ok::<(), proven_logger::Error>(())
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod context;
mod delivery;
mod error;
mod level;
mod record;
mod serialize;
mod service;

pub mod compat;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use config::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_CANCELLATION_DEADLINE, Delivery, LogServiceConfig,
    LogServiceOptions, LogServiceOptionsBuilder, TimestampFormat,
};
pub use context::LogContext;
pub use error::{Error, Result};
pub use level::Level;
pub use record::{LogDetail, LogEntry, ServiceContext, Timestamp};
pub use serialize::{escape, escape_into, serialize, serialize_into};
pub use service::{LogService, LogServiceBuilder, ServiceState};
