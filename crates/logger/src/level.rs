//! Log levels and their wire representation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Log level of an entry.
///
/// Levels are rendered on the wire as a numeric code string (`"100"` through
/// `"600"`) plus a lowercase severity label, so serialization never has to
/// convert an integer to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Most granular information about system state
    Trace,
    /// Fairly granular information about system state
    Debug,
    /// General informational messages
    Info,
    /// Potentially harmful situations of interest
    Warn,
    /// Events preventing normal execution that still allow the service to run
    Error,
    /// The most severe events, likely to have caused the service to terminate
    Fatal,
}

impl Level {
    /// All levels, least severe first
    pub const ALL: [Self; 6] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
        Self::Fatal,
    ];

    /// Numeric code written to the `level` field
    #[inline]
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Trace => "100",
            Self::Debug => "200",
            Self::Info => "300",
            Self::Warn => "400",
            Self::Error => "500",
            Self::Fatal => "600",
        }
    }

    /// Label written to the `severity` field
    #[inline]
    #[must_use]
    pub const fn severity(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.severity())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.severity().eq_ignore_ascii_case(s) || level.code() == s)
            .ok_or_else(|| format!("unknown log level: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_labels() {
        let expected = [
            ("100", "trace"),
            ("200", "debug"),
            ("300", "info"),
            ("400", "warn"),
            ("500", "error"),
            ("600", "fatal"),
        ];

        for (level, (code, severity)) in Level::ALL.into_iter().zip(expected) {
            assert_eq!(level.code(), code);
            assert_eq!(level.severity(), severity);
        }
    }

    #[test]
    fn test_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_parse() {
        assert_eq!("INFO".parse::<Level>(), Ok(Level::Info));
        assert_eq!("500".parse::<Level>(), Ok(Level::Error));
        assert!("verbose".parse::<Level>().is_err());
    }
}
