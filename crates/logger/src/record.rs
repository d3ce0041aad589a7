//! Entry model - designed to live on the stack for the duration of a log call

use crate::Level;
use crate::config::TimestampFormat;
use crate::serialize::escape;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};

/// Identity applied to every entry emitted by one log service instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContext {
    /// Environment, i.e. dev, stage, prod, etc.
    pub environment: String,

    /// The name of the system at large which this service acts within.
    pub system_name: String,

    /// The name of this particular service.
    pub service_name: String,

    /// An ID that distinguishes this service instance from other instances of
    /// the same service within this system and environment.
    pub service_instance_id: String,
}

impl ServiceContext {
    /// Create a new service context
    pub fn new(
        environment: impl Into<String>,
        system_name: impl Into<String>,
        service_name: impl Into<String>,
        service_instance_id: impl Into<String>,
    ) -> Self {
        Self {
            environment: environment.into(),
            system_name: system_name.into(),
            service_name: service_name.into(),
            service_instance_id: service_instance_id.into(),
        }
    }

    /// Copy of this context with every field JSON-escaped
    #[must_use]
    pub fn escaped(&self) -> Self {
        Self {
            environment: escape(&self.environment).into_owned(),
            system_name: escape(&self.system_name).into_owned(),
            service_name: escape(&self.service_name).into_owned(),
            service_instance_id: escape(&self.service_instance_id).into_owned(),
        }
    }
}

/// Per-call payload of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogDetail<'a> {
    /// Log level, which also provides the severity label
    pub level: Level,
    /// Timestamp, assigned at submission
    pub timestamp: &'a str,
    /// The log message
    pub message: &'a str,
    /// Optional extra detail; empty when absent
    pub details: &'a str,
}

impl<'a> LogDetail<'a> {
    /// Create a detail without extra information
    #[inline]
    #[must_use]
    pub const fn new(level: Level, timestamp: &'a str, message: &'a str) -> Self {
        Self {
            level,
            timestamp,
            message,
            details: "",
        }
    }

    /// Builder-style method for setting details
    #[inline]
    #[must_use]
    pub const fn with_details(mut self, details: &'a str) -> Self {
        self.details = details;
        self
    }
}

/// One fully-formed log line.
///
/// Service and context fields are expected to be JSON-safe already (the log
/// service escapes them once up front); message and details are escaped while
/// the entry is serialized.
#[derive(Debug, Clone, Copy)]
pub struct LogEntry<'a> {
    /// Service identity
    pub service: &'a ServiceContext,
    /// Call site
    pub site: &'a str,
    /// Operation in progress
    pub operation: &'a str,
    /// Per-call payload
    pub detail: LogDetail<'a>,
}

impl<'a> LogEntry<'a> {
    /// Compose an entry from its parts
    #[inline]
    #[must_use]
    pub const fn new(
        service: &'a ServiceContext,
        site: &'a str,
        operation: &'a str,
        detail: LogDetail<'a>,
    ) -> Self {
        Self {
            service,
            site,
            operation,
            detail,
        }
    }
}

/// Longest rendering of either timestamp format, rounded up.
const TIMESTAMP_CAPACITY: usize = 40;

/// Stack-allocated timestamp text
#[derive(Clone, Copy)]
pub struct Timestamp {
    buf: [u8; TIMESTAMP_CAPACITY],
    len: usize,
}

impl Timestamp {
    /// Capture the current wall-clock time in the given format
    #[must_use]
    pub fn now(format: TimestampFormat) -> Self {
        let now = Utc::now();
        let mut buf = [0u8; TIMESTAMP_CAPACITY];
        let mut cursor = Cursor::new(&mut buf[..]);

        // Both renderings are ASCII and shorter than the buffer.
        let _ = match format {
            TimestampFormat::Rfc3339Nanos => {
                write!(cursor, "{}", now.format("%Y-%m-%dT%H:%M:%S%.9fZ"))
            }
            TimestampFormat::UnixNanos => {
                write!(cursor, "{}", now.timestamp_nanos_opt().unwrap_or_default())
            }
        };

        #[allow(clippy::cast_possible_truncation)]
        let len = cursor.position() as usize;
        Self { buf, len }
    }

    /// The rendered timestamp
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }
}

impl std::fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Timestamp").field(&self.as_str()).finish()
    }
}
