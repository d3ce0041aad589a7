//! Moving serialized entries from producers to the sink

use crate::config::{Delivery, LogServiceOptions, TimestampFormat};
use crate::error::{Error, Result};
use crate::record::Timestamp;
use crate::serialize::{estimated_len, serialize_into};
use crate::{Level, LogDetail, LogEntry, ServiceContext};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub(crate) const ERROR_SITE: &str = "log service";
pub(crate) const ERROR_OPERATION: &str = "handleLogs";
pub(crate) const SHIPPING_ERROR_MESSAGE: &str = "error occurred while shipping log data";

/// How often a drain re-checks while submissions are still in flight
const BUSY_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Diagnostic stream for entries the sink could not take
pub(crate) type Fallback = Arc<Mutex<Box<dyn Write + Send>>>;

/// Count of submissions that have started but not yet reached the sink, plus
/// the time the last one finished.
#[derive(Debug)]
pub(crate) struct InFlight {
    count: AtomicUsize,
    epoch: Instant,
    last_activity_nanos: AtomicU64,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
            epoch: Instant::now(),
            last_activity_nanos: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn begin(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn end(&self) {
        self.touch();
        self.count.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn touch(&self) {
        let nanos = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.last_activity_nanos.fetch_max(nanos, Ordering::AcqRel);
    }

    fn last_activity(&self) -> Instant {
        self.epoch + Duration::from_nanos(self.last_activity_nanos.load(Ordering::Acquire))
    }

    /// Block until nothing has been in flight for `deadline`, counting from
    /// the later of now and the last completed submission.
    pub(crate) fn wait_quiet(&self, deadline: Duration) {
        let started = Instant::now();

        loop {
            if self.count() > 0 {
                std::thread::sleep(BUSY_POLL_INTERVAL);
                continue;
            }

            let quiet_since = self.last_activity().max(started);
            let quiet_for = quiet_since.elapsed();
            if quiet_for >= deadline {
                if self.count() == 0 {
                    return;
                }
                continue;
            }

            std::thread::sleep(deadline - quiet_for);
        }
    }
}

/// Sole owner of the sink at any instant
pub(crate) struct SinkWriter {
    sink: Box<dyn Write + Send>,
    fallback: Fallback,
    service: ServiceContext,
    timestamp_format: TimestampFormat,
    newline_delimited: bool,
    err_buf: Vec<u8>,
}

impl SinkWriter {
    pub(crate) fn new(
        sink: Box<dyn Write + Send>,
        fallback: Fallback,
        service: ServiceContext,
        options: &LogServiceOptions,
    ) -> Self {
        Self {
            sink,
            fallback,
            service,
            timestamp_format: options.timestamp_format,
            newline_delimited: options.newline_delimited,
            err_buf: Vec::with_capacity(1024),
        }
    }

    /// Hand one entry to the sink. A failure is recovered here and returned
    /// only so the caller can report it once it no longer holds the sink.
    pub(crate) fn write_entry(&mut self, msg: &[u8]) -> Option<io::Error> {
        match self.sink.write_all(msg) {
            Ok(()) => None,
            Err(err) => {
                self.recover(msg, &err);
                Some(err)
            }
        }
    }

    /// The original payload goes to the fallback stream, then a synthetic
    /// error entry is tried on the sink. If the sink refuses that too, both the
    /// synthetic entry and the second error end up on the fallback stream.
    fn recover(&mut self, msg: &[u8], err: &io::Error) {
        let mut fallback = self.fallback.lock();
        let _ = write_line(&mut **fallback, msg);

        let timestamp = Timestamp::now(self.timestamp_format);
        let details = err.to_string();
        let detail = LogDetail::new(Level::Error, timestamp.as_str(), SHIPPING_ERROR_MESSAGE)
            .with_details(&details);

        self.err_buf.clear();
        serialize_into(
            &mut self.err_buf,
            &LogEntry::new(&self.service, ERROR_SITE, ERROR_OPERATION, detail),
        );
        if self.newline_delimited {
            self.err_buf.push(b'\n');
        }

        if let Err(second) = self.sink.write_all(&self.err_buf) {
            let _ = write_line(&mut **fallback, &self.err_buf);
            let _ = write_line(&mut **fallback, second.to_string().as_bytes());
        }
    }
}

fn write_line(out: &mut dyn Write, bytes: &[u8]) -> io::Result<()> {
    out.write_all(bytes)?;
    if !bytes.ends_with(b"\n") {
        out.write_all(b"\n")?;
    }
    out.flush()
}

pub(crate) fn report_dropped(fallback: &Fallback, reason: &str, msg: &[u8]) {
    let mut fallback = fallback.lock();
    let _ = write_line(&mut **fallback, reason.as_bytes());
    let _ = write_line(&mut **fallback, msg);
}

pub(crate) struct LockedState {
    buf: Vec<u8>,
    writer: SinkWriter,
}

pub(crate) enum Message {
    Entry(Vec<u8>),
    Shutdown,
}

/// The delivery path chosen by [`Delivery`]
pub(crate) enum Pipeline {
    Locked {
        state: Mutex<LockedState>,
        initial_capacity: usize,
    },
    Queued {
        sender: Sender<Message>,
        writer: Mutex<Option<JoinHandle<()>>>,
    },
}

impl Pipeline {
    pub(crate) fn start(
        writer: SinkWriter,
        options: &LogServiceOptions,
        in_flight: Arc<InFlight>,
    ) -> Result<Self> {
        match options.delivery {
            Delivery::Locked => Ok(Self::Locked {
                state: Mutex::new(LockedState {
                    buf: Vec::with_capacity(options.buffer_capacity),
                    writer,
                }),
                initial_capacity: options.buffer_capacity,
            }),
            Delivery::Queued { capacity } => {
                let (sender, receiver) = channel::bounded(capacity);
                let handle = std::thread::Builder::new()
                    .name("log-writer".to_string())
                    .spawn(move || run_writer(&receiver, writer, &in_flight))
                    .map_err(Error::SpawnWriter)?;

                Ok(Self::Queued {
                    sender,
                    writer: Mutex::new(Some(handle)),
                })
            }
        }
    }

    /// Deliver one entry. The caller has already counted it as in flight;
    /// this path is responsible for ending it.
    pub(crate) fn deliver(
        &self,
        entry: &LogEntry<'_>,
        newline_delimited: bool,
        in_flight: &InFlight,
        fallback: &Fallback,
    ) {
        match self {
            Self::Locked {
                state,
                initial_capacity,
            } => {
                let failure = {
                    let mut guard = state.lock();
                    let LockedState { buf, writer } = &mut *guard;

                    buf.clear();
                    serialize_into(buf, entry);
                    if newline_delimited {
                        buf.push(b'\n');
                    }
                    let failure = writer.write_entry(buf);

                    // One oversized entry should not pin a huge buffer forever.
                    if buf.capacity() > initial_capacity.saturating_mul(4) {
                        buf.shrink_to(*initial_capacity);
                    }
                    failure
                };
                in_flight.end();

                if let Some(err) = failure {
                    warn!(error = %err, "log sink write failed");
                }
            }
            Self::Queued { sender, .. } => {
                let mut buf = Vec::with_capacity(estimated_len(entry) + 1);
                serialize_into(&mut buf, entry);
                if newline_delimited {
                    buf.push(b'\n');
                }

                // Blocks while the queue is full.
                if let Err(channel::SendError(message)) = sender.send(Message::Entry(buf)) {
                    in_flight.end();
                    if let Message::Entry(buf) = message {
                        report_dropped(fallback, "log writer is stopped; entry dropped", &buf);
                    }
                }
            }
        }
    }

    /// Stop the background writer, if any, after it has written everything
    /// queued ahead of the stop request.
    pub(crate) fn stop(&self) {
        match self {
            Self::Locked { state, .. } => {
                let _ = state.lock().writer.sink.flush();
            }
            Self::Queued { sender, writer } => {
                let Some(handle) = writer.lock().take() else {
                    return;
                };

                let _ = sender.send(Message::Shutdown);
                if handle.join().is_err() {
                    warn!("log writer thread panicked");
                }
            }
        }
    }
}

fn run_writer(receiver: &Receiver<Message>, mut writer: SinkWriter, in_flight: &InFlight) {
    debug!("log writer started");

    for message in receiver {
        match message {
            Message::Entry(buf) => {
                let failure = writer.write_entry(&buf);
                in_flight.end();
                if let Some(err) = failure {
                    warn!(error = %err, "log sink write failed");
                }
            }
            Message::Shutdown => break,
        }
    }

    let _ = writer.sink.flush();
    debug!("log writer stopped");
}
