//! Builder for socket-backed [`ResilientStream`]s.
//!
//! Exposes transport selection, timeout tuning, TLS configuration, name
//! resolution and the recovery backoff. Validation happens in
//! [`build`](SocketStreamBuilder::build) so a misconfigured stream never
//! reaches the network.

use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::{
    error::BuildError,
    reporter::SharedReporter,
    resolver::{SharedResolver, SystemResolver},
    socket::{
        DEFAULT_CONNECT_TIMEOUT, DEFAULT_WRITE_TIMEOUT, ResolutionPolicy, SocketSinkFactory,
        SocketTransport, TcpTransport, TlsOptions, UnixTransport,
    },
    stream::{ResilientStream, StreamOptions},
};

use super::{
    builder_macros::{ensure_positive, option_setter, stream_settings_setters},
    common::StreamSettings,
};

#[derive(Clone, Debug)]
enum TransportConfig {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

#[derive(Clone, Debug, Default)]
struct TlsConfig {
    domain: Option<String>,
    insecure: bool,
}

/// Stream type produced by [`SocketStreamBuilder`].
pub type SocketStream = ResilientStream<SocketSinkFactory>;

/// Builder for constructing [`SocketStream`] instances.
#[derive(Clone, Default)]
pub struct SocketStreamBuilder {
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    transport: Option<TransportConfig>,
    tls: Option<TlsConfig>,
    resolution: ResolutionPolicy,
    resolver: Option<SharedResolver>,
    settings: StreamSettings,
}

impl SocketStreamBuilder {
    /// Create a new builder with no transport configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the builder to use TCP.
    pub fn with_tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.transport = Some(TransportConfig::Tcp {
            host: host.into(),
            port,
        });
        self
    }

    /// Configure the builder to use a Unix domain socket.
    pub fn with_unix_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.transport = Some(TransportConfig::Unix { path: path.into() });
        self
    }

    /// Configure TLS using the provided domain and validation policy.
    ///
    /// The domain defaults to the TCP host when `None` or blank.
    pub fn with_tls(mut self, domain: Option<String>, insecure: bool) -> Self {
        self.tls = Some(TlsConfig { domain, insecure });
        self
    }

    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);

    /// Choose when host names are resolved.
    pub fn with_resolution_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.resolution = policy;
        self
    }

    /// Replace the system resolver.
    pub fn with_resolver(mut self, resolver: SharedResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    stream_settings_setters!();

    fn validate(&self) -> Result<(), BuildError> {
        self.validate_transport()?;
        self.validate_timeouts()?;
        Ok(())
    }

    fn validate_transport(&self) -> Result<(), BuildError> {
        match &self.transport {
            None => Err(BuildError::InvalidConfig(
                "socket stream requires a transport".into(),
            )),
            Some(TransportConfig::Unix { .. }) if self.tls.is_some() => Err(
                BuildError::InvalidConfig("tls is only supported for tcp transports".into()),
            ),
            Some(TransportConfig::Tcp { host, .. }) if host.trim().is_empty() => Err(
                BuildError::InvalidConfig("tcp host must not be empty".into()),
            ),
            Some(TransportConfig::Tcp { port, .. }) => {
                ensure_positive!(*port, "tcp port")?;
                Ok(())
            }
            Some(TransportConfig::Unix { path }) if path.as_os_str().is_empty() => Err(
                BuildError::InvalidConfig("unix socket path must not be empty".into()),
            ),
            Some(TransportConfig::Unix { .. }) => Ok(()),
        }
    }

    fn validate_timeouts(&self) -> Result<(), BuildError> {
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.write_timeout_ms {
            ensure_positive!(timeout, "write_timeout_ms")?;
        }
        Ok(())
    }

    fn build_transport(&self) -> Result<SocketTransport, BuildError> {
        match &self.transport {
            Some(TransportConfig::Tcp { host, port }) => Ok(SocketTransport::Tcp(TcpTransport {
                host: host.clone(),
                port: *port,
                tls: self.build_tls_options(host),
            })),
            Some(TransportConfig::Unix { path }) => {
                Ok(SocketTransport::Unix(UnixTransport { path: path.clone() }))
            }
            None => Err(BuildError::InvalidConfig(
                "socket stream requires a transport".into(),
            )),
        }
    }

    fn build_tls_options(&self, host: &str) -> Option<TlsOptions> {
        self.tls.as_ref().map(|tls_cfg| {
            let domain = tls_cfg
                .domain
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| host.to_owned());
            TlsOptions {
                domain,
                insecure_skip_verify: tls_cfg.insecure,
            }
        })
    }

    /// Validate the configuration and produce the sink factory alone.
    pub fn build_factory(&self) -> Result<SocketSinkFactory, BuildError> {
        self.validate()?;
        let transport = self.build_transport()?;
        let connect_timeout = self
            .connect_timeout_ms
            .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_millis);
        let write_timeout = self
            .write_timeout_ms
            .map_or(DEFAULT_WRITE_TIMEOUT, Duration::from_millis);
        let resolver = self
            .resolver
            .clone()
            .unwrap_or_else(|| Arc::new(SystemResolver));
        Ok(SocketSinkFactory::new(
            transport,
            connect_timeout,
            Some(write_timeout),
            self.resolution,
            resolver,
        ))
    }

    pub(crate) fn build_parts(
        &self,
    ) -> Result<(SocketSinkFactory, StreamOptions, SharedReporter), BuildError> {
        let options = self.settings.options()?;
        let factory = self.build_factory()?;
        Ok((factory, options, self.settings.reporter()))
    }

    /// Build an unopened stream.
    pub fn build(&self) -> Result<SocketStream, BuildError> {
        let (factory, options, reporter) = self.build_parts()?;
        Ok(ResilientStream::with_options(factory, reporter, options))
    }

    /// Build the stream and perform the initial open.
    pub fn connect(&self) -> Result<SocketStream, BuildError> {
        let stream = self.build()?;
        stream.open()?;
        Ok(stream)
    }
}

impl std::fmt::Debug for SocketStreamBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketStreamBuilder")
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("write_timeout_ms", &self.write_timeout_ms)
            .field("transport", &self.transport)
            .field("tls", &self.tls)
            .field("resolution", &self.resolution)
            .field("custom_resolver", &self.resolver.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}
