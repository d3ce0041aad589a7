//! Hand-rolled JSON rendering of a log entry.
//!
//! Every entry has the same flat shape, so the output is built token by token
//! straight into a caller-owned buffer instead of going through a generic
//! serializer. Field order is fixed:
//!
//! ```text
//! timestamp, environment, system_name, service_name, service_instance_id,
//! site, operation, level, severity, msg, details
//! ```

use crate::LogEntry;
use std::borrow::Cow;

const BRACE_OPEN: &[u8] = b"{";
const BRACE_CLOSE: &[u8] = b"}";
const FIELD_OPEN: &[u8] = b":\"";
const FIELD_CLOSE: &[u8] = b"\",";
const FINAL_FIELD_CLOSE: &[u8] = b"\"";

const TIMESTAMP: &[u8] = b"\"timestamp\"";
const ENVIRONMENT: &[u8] = b"\"environment\"";
const SYSTEM_NAME: &[u8] = b"\"system_name\"";
const SERVICE_NAME: &[u8] = b"\"service_name\"";
const SERVICE_INSTANCE_ID: &[u8] = b"\"service_instance_id\"";
const SITE: &[u8] = b"\"site\"";
const OPERATION: &[u8] = b"\"operation\"";
const LEVEL: &[u8] = b"\"level\"";
const SEVERITY: &[u8] = b"\"severity\"";
const MESSAGE: &[u8] = b"\"msg\"";
const DETAILS: &[u8] = b"\"details\"";

/// Bytes of fixed tokens in every entry, used to size one-off buffers.
pub(crate) const FIXED_OVERHEAD: usize = 2
    + TIMESTAMP.len()
    + ENVIRONMENT.len()
    + SYSTEM_NAME.len()
    + SERVICE_NAME.len()
    + SERVICE_INSTANCE_ID.len()
    + SITE.len()
    + OPERATION.len()
    + LEVEL.len()
    + SEVERITY.len()
    + MESSAGE.len()
    + DETAILS.len()
    + 11 * FIELD_OPEN.len()
    + 10 * FIELD_CLOSE.len()
    + FINAL_FIELD_CLOSE.len();

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Append `entry` as a single-line JSON object to `buf`.
///
/// The buffer is not cleared first; callers reuse one buffer across entries
/// by clearing it themselves.
pub fn serialize_into(buf: &mut Vec<u8>, entry: &LogEntry<'_>) {
    let service = entry.service;
    let detail = &entry.detail;

    buf.extend_from_slice(BRACE_OPEN);
    raw_field(buf, TIMESTAMP, detail.timestamp);
    raw_field(buf, ENVIRONMENT, &service.environment);
    raw_field(buf, SYSTEM_NAME, &service.system_name);
    raw_field(buf, SERVICE_NAME, &service.service_name);
    raw_field(buf, SERVICE_INSTANCE_ID, &service.service_instance_id);
    raw_field(buf, SITE, entry.site);
    raw_field(buf, OPERATION, entry.operation);
    raw_field(buf, LEVEL, detail.level.code());
    raw_field(buf, SEVERITY, detail.level.severity());

    buf.extend_from_slice(MESSAGE);
    buf.extend_from_slice(FIELD_OPEN);
    escape_into(buf, detail.message);
    buf.extend_from_slice(FIELD_CLOSE);

    buf.extend_from_slice(DETAILS);
    buf.extend_from_slice(FIELD_OPEN);
    escape_into(buf, detail.details);
    buf.extend_from_slice(FINAL_FIELD_CLOSE);
    buf.extend_from_slice(BRACE_CLOSE);
}

/// Render `entry` into a freshly allocated buffer
#[must_use]
pub fn serialize(entry: &LogEntry<'_>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(estimated_len(entry));
    serialize_into(&mut buf, entry);
    buf
}

/// Size hint for an entry, exact when message and details need no escaping
pub(crate) fn estimated_len(entry: &LogEntry<'_>) -> usize {
    let service = entry.service;
    let detail = &entry.detail;

    FIXED_OVERHEAD
        + detail.timestamp.len()
        + service.environment.len()
        + service.system_name.len()
        + service.service_name.len()
        + service.service_instance_id.len()
        + entry.site.len()
        + entry.operation.len()
        + detail.level.code().len()
        + detail.level.severity().len()
        + detail.message.len()
        + detail.details.len()
}

#[inline(always)]
fn raw_field(buf: &mut Vec<u8>, key: &[u8], value: &str) {
    buf.extend_from_slice(key);
    buf.extend_from_slice(FIELD_OPEN);
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(FIELD_CLOSE);
}

/// Replacement for a byte that may not appear raw inside a JSON string
#[inline]
const fn replacement(byte: u8) -> Option<&'static [u8]> {
    match byte {
        0x08 => Some(b"\\b"),
        0x0c => Some(b"\\f"),
        b'\n' => Some(b"\\n"),
        b'\r' => Some(b"\\r"),
        b'\t' => Some(b"\\t"),
        b'"' => Some(b"\\\""),
        b'\\' => Some(b"\\\\"),
        _ => None,
    }
}

#[inline]
const fn needs_escape(byte: u8) -> bool {
    byte < 0x20 || byte == b'"' || byte == b'\\'
}

/// Append `s` to `buf` with JSON string escaping applied.
///
/// Unescaped runs are copied in one go, so a string with nothing to escape
/// costs a single copy.
pub fn escape_into(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let mut start = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if !needs_escape(byte) {
            continue;
        }

        buf.extend_from_slice(&bytes[start..i]);
        match replacement(byte) {
            Some(escaped) => buf.extend_from_slice(escaped),
            None => buf.extend_from_slice(&[
                b'\\',
                b'u',
                b'0',
                b'0',
                HEX[(byte >> 4) as usize],
                HEX[(byte & 0x0f) as usize],
            ]),
        }
        start = i + 1;
    }

    buf.extend_from_slice(&bytes[start..]);
}

/// JSON-escape `s`, borrowing when nothing needs replacing
#[must_use]
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.bytes().any(needs_escape) {
        return Cow::Borrowed(s);
    }

    let mut buf = Vec::with_capacity(s.len() + 8);
    escape_into(&mut buf, s);

    // Only ASCII bytes were inserted and multi-byte sequences were copied
    // whole, so the buffer is still valid UTF-8.
    Cow::Owned(String::from_utf8(buf).unwrap_or_else(|e| {
        String::from_utf8_lossy(e.as_bytes()).into_owned()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Level, LogDetail, ServiceContext};

    fn sample_service() -> ServiceContext {
        ServiceContext::new("env", "sys", "srn", "sid")
    }

    #[test]
    fn test_serialize_matches_wire_format() {
        let service = sample_service();
        let detail = LogDetail::new(Level::Info, "tms", "msg").with_details("dtl");
        let entry = LogEntry::new(&service, "sit", "opn", detail);

        let out = serialize(&entry);

        assert_eq!(
            std::str::from_utf8(&out).unwrap(),
            r#"{"timestamp":"tms","environment":"env","system_name":"sys","service_name":"srn","service_instance_id":"sid","site":"sit","operation":"opn","level":"300","severity":"info","msg":"msg","details":"dtl"}"#
        );
    }

    #[test]
    fn test_empty_details_is_last_field() {
        let service = sample_service();
        let detail = LogDetail::new(Level::Warn, "tms", "msg");
        let entry = LogEntry::new(&service, "sit", "opn", detail);

        let out = serialize(&entry);

        assert!(out.ends_with(br#""msg":"msg","details":""}"#));
    }

    #[test]
    fn test_estimated_len_exact_without_escapes() {
        let service = sample_service();
        let detail = LogDetail::new(Level::Fatal, "2024-01-01T00:00:00.000000000Z", "hello")
            .with_details("world");
        let entry = LogEntry::new(&service, "site", "operation", detail);

        assert_eq!(serialize(&entry).len(), estimated_len(&entry));
    }

    #[test]
    fn test_serialize_into_appends() {
        let service = sample_service();
        let detail = LogDetail::new(Level::Debug, "tms", "one");
        let entry = LogEntry::new(&service, "sit", "opn", detail);

        let mut buf = b"prefix".to_vec();
        serialize_into(&mut buf, &entry);

        assert!(buf.starts_with(b"prefix{\"timestamp\""));
    }

    #[test]
    fn test_escape_known_characters() {
        let cases = [
            ("\u{8}\u{8}", "\\b\\b"),
            ("\u{c}\u{c}", "\\f\\f"),
            ("\n\n", "\\n\\n"),
            ("\r\r", "\\r\\r"),
            ("\t\t", "\\t\\t"),
            ("\"", "\\\""),
            ("\\", "\\\\"),
            ("a\"b\\c\nd", "a\\\"b\\\\c\\nd"),
        ];

        for (input, expected) in cases {
            assert_eq!(escape(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_escape_other_control_characters() {
        assert_eq!(escape("\u{1}x\u{1f}"), "\\u0001x\\u001f");
    }

    #[test]
    fn test_escape_borrows_safe_strings() {
        assert!(matches!(escape("plain text"), Cow::Borrowed("plain text")));
        assert!(matches!(escape("ünïcødé ✓"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_keeps_multibyte_characters() {
        assert_eq!(escape("é\n✓"), "é\\n✓");
    }
}
