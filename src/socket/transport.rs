//! Transport primitives for socket sinks.

use std::{
    fmt,
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream},
    path::PathBuf,
    time::Duration,
};

use log::debug;
use native_tls::{TlsConnector, TlsStream};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::{reporter::LOG_TARGET, sink::Sink};

/// Transport targeted by a socket sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketTransport {
    /// TCP transport with optional TLS.
    Tcp(TcpTransport),
    /// Unix domain socket transport.
    Unix(UnixTransport),
}

/// TCP transport configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpTransport {
    /// Hostname or IP address to connect to.
    pub host: String,
    /// TCP port number.
    pub port: u16,
    /// Optional TLS configuration.
    pub tls: Option<TlsOptions>,
}

/// Unix domain socket configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnixTransport {
    /// Path to the socket file.
    pub path: PathBuf,
}

/// TLS connection options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsOptions {
    /// Domain name presented during the TLS handshake.
    pub domain: String,
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// Formats as the diagnostic description used for the whole stream.
impl fmt::Display for SocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketTransport::Tcp(TcpTransport {
                host,
                port,
                tls: None,
            }) => write!(f, "socket stream [{host}:{port}]"),
            SocketTransport::Tcp(TcpTransport {
                host,
                port,
                tls: Some(_),
            }) => write!(f, "tls socket stream [{host}:{port}]"),
            SocketTransport::Unix(UnixTransport { path }) => {
                write!(f, "unix socket stream [{}]", path.display())
            }
        }
    }
}

/// Live socket connection owned by a stream.
pub enum ActiveConnection {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ActiveConnection {
    /// Update the write timeout for the underlying socket.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.set_write_timeout(timeout),
            ActiveConnection::Tls(stream) => stream.get_ref().set_write_timeout(timeout),
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => stream.set_write_timeout(timeout),
        }
    }

    /// Remote address for TCP based connections.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.peer_addr().ok(),
            ActiveConnection::Tls(stream) => stream.get_ref().peer_addr().ok(),
            #[cfg(unix)]
            ActiveConnection::Unix(_) => None,
        }
    }
}

impl Sink for ActiveConnection {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.write_all(buf),
            ActiveConnection::Tls(stream) => stream.write_all(buf),
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => stream.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.flush(),
            ActiveConnection::Tls(stream) => stream.flush(),
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => stream.flush(),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.shutdown(Shutdown::Both),
            ActiveConnection::Tls(stream) => {
                let close_notify = stream.shutdown();
                finish_tls_close(close_notify, stream.get_ref())
            }
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveConnection::PlainTcp(stream) => f.debug_tuple("PlainTcp").field(stream).finish(),
            ActiveConnection::Tls(stream) => f.debug_tuple("Tls").field(stream.get_ref()).finish(),
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => f.debug_tuple("Unix").field(stream).finish(),
        }
    }
}

/// Shut down the TCP side of a TLS connection whatever became of its
/// close_notify. A peer that is already gone cannot acknowledge the alert.
pub(super) fn finish_tls_close(close_notify: io::Result<()>, tcp: &TcpStream) -> io::Result<()> {
    if let Err(err) = close_notify {
        debug!(target: LOG_TARGET, "TLS close_notify failed: {err}");
    }
    tcp.shutdown(Shutdown::Both)
}

/// Connect to the first reachable address, trying each in turn.
///
/// Every attempt is bounded by `timeout`. The error of the last attempt is
/// returned when none succeeds.
pub(crate) fn connect_tcp(
    addrs: &[SocketAddr],
    timeout: Duration,
) -> io::Result<(TcpStream, SocketAddr)> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => {
                stream.set_nonblocking(false)?;
                return Ok((stream, *addr));
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "no addresses to connect to")
    }))
}

/// Run the TLS handshake over `stream`, bounded by `timeout`.
pub(crate) fn handshake(
    tls: &TlsOptions,
    stream: TcpStream,
    timeout: Duration,
) -> io::Result<TlsStream<TcpStream>> {
    let connector = tls.connector()?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    let stream = connector
        .connect(&tls.domain, stream)
        .map_err(io::Error::other)?;
    stream.get_ref().set_read_timeout(None)?;
    Ok(stream)
}

#[cfg(unix)]
pub(crate) fn connect_unix(config: &UnixTransport) -> io::Result<ActiveConnection> {
    UnixStream::connect(&config.path).map(ActiveConnection::Unix)
}

#[cfg(not(unix))]
pub(crate) fn connect_unix(_config: &UnixTransport) -> io::Result<ActiveConnection> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "unix domain sockets are not supported on this platform",
    ))
}
