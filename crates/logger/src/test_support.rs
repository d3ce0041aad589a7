//! Test support utilities
//!
//! This module provides an in-memory sink for asserting on log output.
//! It's only available when the `test-support` feature is enabled.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    writes: Vec<Vec<u8>>,
    attempts: usize,
    fail_next: usize,
}

/// A sink that records every write in memory.
///
/// Clones share the same storage, so one clone can be handed to a
/// [`LogService`](crate::LogService) while the test keeps another to inspect
/// what arrived. Each successful `write` call is recorded as its own entry;
/// failures can be injected with [`fail_next`](Self::fail_next).
#[derive(Clone, Default)]
pub struct CaptureSink {
    inner: Arc<Mutex<Inner>>,
}

impl CaptureSink {
    /// Create an empty capture sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` writes fail with an I/O error
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().fail_next = count;
    }

    /// Every successful write, in arrival order
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().writes.clone()
    }

    /// Every successful write as text
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.inner
            .lock()
            .writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// All successful writes concatenated as text
    #[must_use]
    pub fn contents(&self) -> String {
        self.entries().concat()
    }

    /// Number of write calls, failed ones included
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.inner.lock().attempts
    }

    /// Check if any write contains a specific string
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.entries().iter().any(|e| e.contains(text))
    }

    /// Forget everything captured so far
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.writes.clear();
        inner.attempts = 0;
    }
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        inner.attempts += 1;

        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "injected sink failure",
            ));
        }

        inner.writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CaptureSink")
            .field("writes", &inner.writes.len())
            .field("attempts", &inner.attempts)
            .field("fail_next", &inner.fail_next)
            .finish()
    }
}
