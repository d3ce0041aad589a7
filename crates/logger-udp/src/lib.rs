//! UDP sink for the structured JSON logger
//!
//! Each entry is sent as a single datagram to a log collector. Delivery is
//! fire-and-forget: a collector that is down or unreachable shows up, at most,
//! as a send error, which the log service handles like any other sink failure.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use proven_logger::{Error, LogService, LogServiceOptions, Result, ServiceContext};
use std::io::{self, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::debug;

/// A connected UDP socket usable as a log sink
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
}

impl UdpSink {
    /// Resolve `addr` (`host:port`) and connect a local socket to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dial`] if the address cannot be resolved or the
    /// socket cannot be bound or connected.
    pub fn connect(addr: &str) -> Result<Self> {
        let dial = |source: io::Error| Error::Dial {
            addr: addr.to_string(),
            source,
        };

        let remote = addr
            .to_socket_addrs()
            .map_err(dial)?
            .next()
            .ok_or_else(|| {
                dial(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "address resolved to nothing",
                ))
            })?;

        let local: SocketAddr = match remote {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local).map_err(dial)?;
        socket.connect(remote).map_err(dial)?;

        debug!(%remote, "udp log sink connected");
        Ok(Self { socket })
    }

    /// Address of the collector this sink sends to
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is no longer connected.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }
}

impl Write for UdpSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Start a log service that sends entries to the collector at `addr`.
///
/// # Errors
///
/// Returns [`Error::Dial`] if the collector address cannot be reached.
pub fn initialize_udp(addr: &str, service_context: ServiceContext) -> Result<LogService> {
    initialize_udp_with_options(addr, service_context, LogServiceOptions::default())
}

/// Start a log service with custom options that sends entries to `addr`.
///
/// # Errors
///
/// Returns [`Error::Dial`] if the collector address cannot be reached, or any
/// error [`LogService::initialize_with_options`] returns.
pub fn initialize_udp_with_options(
    addr: &str,
    service_context: ServiceContext,
    options: LogServiceOptions,
) -> Result<LogService> {
    let sink = UdpSink::connect(addr)?;
    LogService::initialize_with_options(sink, service_context, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_rejects_bad_address() {
        let err = UdpSink::connect("not an address").unwrap_err();

        match err {
            Error::Dial { addr, .. } => assert_eq!(addr, "not an address"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_connect_records_peer() {
        let collector = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = collector.local_addr().unwrap();

        let sink = UdpSink::connect(&addr.to_string()).unwrap();

        assert_eq!(sink.peer_addr().unwrap(), addr);
    }
}
