//! Log service configuration

use crate::ServiceContext;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 64 KiB matches the theoretical maximum size of a UDP datagram.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Default quiet period the drain waits for before returning.
pub const DEFAULT_CANCELLATION_DEADLINE: Duration = Duration::from_secs(30);

/// How timestamps are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// RFC 3339 in UTC with nanosecond precision, e.g. `2024-05-01T12:00:00.123456789Z`
    #[default]
    Rfc3339Nanos,
    /// Nanoseconds since the Unix epoch as a decimal string
    UnixNanos,
}

/// How entries travel from producers to the sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Delivery {
    /// Producers take turns serializing into one shared buffer and write the
    /// sink themselves while holding the lock.
    #[default]
    Locked,
    /// Producers hand owned buffers to a background writer thread through a
    /// bounded queue; a full queue blocks the producer.
    Queued {
        /// Maximum number of entries waiting for the writer
        capacity: usize,
    },
}

/// Behavioural settings for a log service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogServiceOptions {
    /// How long submissions must stay quiet before a drain completes
    #[serde(rename = "cancellation_deadline_ms", with = "duration_ms")]
    pub cancellation_deadline: Duration,
    /// Initial capacity of serialization buffers
    pub buffer_capacity: usize,
    /// Delivery mode
    pub delivery: Delivery,
    /// Timestamp rendering
    pub timestamp_format: TimestampFormat,
    /// Append `\n` after each entry for line-oriented sinks
    pub newline_delimited: bool,
}

impl Default for LogServiceOptions {
    fn default() -> Self {
        Self {
            cancellation_deadline: DEFAULT_CANCELLATION_DEADLINE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            delivery: Delivery::default(),
            timestamp_format: TimestampFormat::default(),
            newline_delimited: false,
        }
    }
}

impl LogServiceOptions {
    /// Create a builder starting from the defaults
    #[must_use]
    pub fn builder() -> LogServiceOptionsBuilder {
        LogServiceOptionsBuilder::default()
    }

    /// Check the options for values the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] if a queued delivery has zero capacity.
    pub fn validate(&self) -> Result<()> {
        if let Delivery::Queued { capacity: 0 } = self.delivery {
            return Err(Error::InvalidOptions(
                "queued delivery requires a capacity of at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`LogServiceOptions`]
#[derive(Debug, Clone, Default)]
pub struct LogServiceOptionsBuilder {
    options: LogServiceOptions,
}

impl LogServiceOptionsBuilder {
    /// Set the drain quiet period
    #[must_use]
    pub const fn cancellation_deadline(mut self, deadline: Duration) -> Self {
        self.options.cancellation_deadline = deadline;
        self
    }

    /// Set the initial serialization buffer capacity
    #[must_use]
    pub const fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.buffer_capacity = capacity;
        self
    }

    /// Set the delivery mode
    #[must_use]
    pub const fn delivery(mut self, delivery: Delivery) -> Self {
        self.options.delivery = delivery;
        self
    }

    /// Use a bounded queue with a background writer
    #[must_use]
    pub const fn queued(self, capacity: usize) -> Self {
        self.delivery(Delivery::Queued { capacity })
    }

    /// Set the timestamp format
    #[must_use]
    pub const fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.options.timestamp_format = format;
        self
    }

    /// Terminate each entry with a newline
    #[must_use]
    pub const fn newline_delimited(mut self, enabled: bool) -> Self {
        self.options.newline_delimited = enabled;
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> LogServiceOptions {
        self.options
    }
}

/// File-friendly description of a log service
///
/// ```toml
/// [service]
/// environment = "prod"
/// system_name = "billing"
/// service_name = "invoicer"
/// service_instance_id = "invoicer-1"
///
/// [options]
/// cancellation_deadline_ms = 5000
/// delivery = { mode = "queued", capacity = 1024 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogServiceConfig {
    /// Identity applied to every entry
    pub service: ServiceContext,
    /// Behavioural settings
    #[serde(default)]
    pub options: LogServiceOptions,
}

impl LogServiceConfig {
    /// Parse a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this shape or the
    /// options fail validation.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.options.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Io("failed to read log service config", e))?;
        Self::from_toml_str(&text)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
