//! Host name resolution for socket sinks.

use std::{
    collections::HashMap,
    io,
    net::{IpAddr, SocketAddr, ToSocketAddrs},
    sync::Arc,
};

use crate::reporter::{ErrorReporter, Severity};

/// Maps a host and port to connectable addresses.
///
/// Implementations must not cache: every call reflects the resolver state at
/// the time of the call. Caching is a decision of the sink factory.
pub trait Resolve: Send + Sync {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Shared resolver handle held by socket factories.
pub type SharedResolver = Arc<dyn Resolve>;

/// Resolves through the platform resolver (`getaddrinfo` on Unix).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses found for {host}"),
            ));
        }
        Ok(addrs)
    }
}

/// Resolves names from a fixed table, falling back to IP literals.
///
/// Useful for pinning collectors to known addresses and for tests.
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `host` to `addr`. Repeated calls add further addresses.
    pub fn with_host(mut self, host: impl Into<String>, addr: IpAddr) -> Self {
        self.hosts.entry(host.into()).or_default().push(addr);
        self
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        if let Some(addrs) = self.hosts.get(host) {
            return Ok(addrs.iter().map(|ip| SocketAddr::new(*ip, port)).collect());
        }
        host.parse::<IpAddr>()
            .map(|ip| vec![SocketAddr::new(ip, port)])
            .map_err(|_| {
                io::Error::new(io::ErrorKind::NotFound, format!("unknown host {host}"))
            })
    }
}

pub(crate) fn unresolved_message(host: &str) -> String {
    format!("Could not find address of [{host}].")
}

/// Resolve `host`, reporting any failure through `reporter`.
///
/// The error is still returned so the caller can attach it to its own error
/// type; it must not be reported a second time.
pub fn resolve_or_report(
    resolver: &dyn Resolve,
    host: &str,
    port: u16,
    reporter: &dyn ErrorReporter,
) -> io::Result<Vec<SocketAddr>> {
    resolver.resolve(host, port).inspect_err(|err| {
        reporter.report(Severity::Error, &unresolved_message(host), Some(err));
    })
}
