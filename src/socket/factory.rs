//! Sink factory opening a fresh socket connection per call.

use std::{io, net::SocketAddr, time::Duration};

use log::debug;
use serde::Deserialize;

use crate::{
    error::OpenError,
    reporter::LOG_TARGET,
    resolver::SharedResolver,
    sink::SinkFactory,
};

use super::transport::{
    ActiveConnection, SocketTransport, TcpTransport, connect_tcp, connect_unix, handshake,
};

/// When host names are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Resolve again before every connection attempt, following DNS changes
    /// during long outages.
    #[default]
    EveryOpen,
    /// Resolve once and reuse the first successful answer.
    Once,
}

/// Opens socket connections for a [`ResilientStream`](crate::ResilientStream).
///
/// Failures are returned, never reported; the stream owning the factory
/// decides what reaches its reporter.
pub struct SocketSinkFactory {
    transport: SocketTransport,
    connect_timeout: Duration,
    write_timeout: Option<Duration>,
    resolution: ResolutionPolicy,
    resolver: SharedResolver,
    cached_addrs: Option<Vec<SocketAddr>>,
    resolved_address: Option<SocketAddr>,
}

impl SocketSinkFactory {
    pub fn new(
        transport: SocketTransport,
        connect_timeout: Duration,
        write_timeout: Option<Duration>,
        resolution: ResolutionPolicy,
        resolver: SharedResolver,
    ) -> Self {
        Self {
            transport,
            connect_timeout,
            write_timeout,
            resolution,
            resolver,
            cached_addrs: None,
            resolved_address: None,
        }
    }

    pub fn transport(&self) -> &SocketTransport {
        &self.transport
    }

    /// Address of the last successful TCP connection, if any.
    pub fn resolved_address(&self) -> Option<SocketAddr> {
        self.resolved_address
    }

    fn addresses(&mut self, tcp: &TcpTransport) -> Result<Vec<SocketAddr>, OpenError> {
        if self.resolution == ResolutionPolicy::Once
            && let Some(addrs) = &self.cached_addrs
        {
            return Ok(addrs.clone());
        }
        let addrs = self
            .resolver
            .resolve(&tcp.host, tcp.port)
            .map_err(|source| OpenError::ResolutionFailed {
                host: tcp.host.clone(),
                source,
            })?;
        if self.resolution == ResolutionPolicy::Once {
            self.cached_addrs = Some(addrs.clone());
        }
        Ok(addrs)
    }

    fn open_tcp(&mut self, tcp: &TcpTransport) -> Result<ActiveConnection, OpenError> {
        let addrs = self.addresses(tcp)?;
        let connect = || -> io::Result<(ActiveConnection, SocketAddr)> {
            let (stream, addr) = connect_tcp(&addrs, self.connect_timeout)?;
            let connection = match &tcp.tls {
                Some(tls) => {
                    ActiveConnection::Tls(Box::new(handshake(tls, stream, self.connect_timeout)?))
                }
                None => ActiveConnection::PlainTcp(stream),
            };
            Ok((connection, addr))
        };
        let (mut connection, addr) = connect().map_err(|source| self.connect_failed(source))?;
        connection
            .set_write_timeout(self.write_timeout)
            .map_err(|source| self.connect_failed(source))?;
        self.resolved_address = Some(addr);
        debug!(target: LOG_TARGET, "connected {} via {addr}", self.transport);
        Ok(connection)
    }

    fn connect_failed(&self, source: io::Error) -> OpenError {
        OpenError::ConnectFailed {
            target: self.describe(),
            source,
        }
    }
}

impl SinkFactory for SocketSinkFactory {
    type Sink = ActiveConnection;

    fn open_sink(&mut self) -> Result<ActiveConnection, OpenError> {
        match self.transport.clone() {
            SocketTransport::Tcp(tcp) => self.open_tcp(&tcp),
            SocketTransport::Unix(unix) => {
                let mut connection =
                    connect_unix(&unix).map_err(|source| self.connect_failed(source))?;
                connection
                    .set_write_timeout(self.write_timeout)
                    .map_err(|source| self.connect_failed(source))?;
                debug!(target: LOG_TARGET, "connected {}", self.transport);
                Ok(connection)
            }
        }
    }

    fn describe(&self) -> String {
        self.transport.to_string()
    }
}

impl std::fmt::Debug for SocketSinkFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSinkFactory")
            .field("transport", &self.transport)
            .field("connect_timeout", &self.connect_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("resolution", &self.resolution)
            .field("resolved_address", &self.resolved_address)
            .finish()
    }
}
