//! Serde configuration for resilient streams.
//!
//! Host applications can describe a stream in JSON (or any serde format) and
//! turn it into a builder, or build a type-erased [`AnyStream`] directly:
//!
//! ```
//! use resilient_stream::config::StreamConfig;
//!
//! let config: StreamConfig = serde_json::from_str(
//!     r#"{"kind": "socket", "host": "collector.local", "port": 5170}"#,
//! )
//! .expect("valid config");
//! let stream = config.build(None).expect("valid stream");
//! assert_eq!(stream.describe(), "socket stream [collector.local:5170]");
//! ```

use std::{io, path::PathBuf};

use serde::Deserialize;

use crate::{
    builders::{BackoffOverrides, FileStreamBuilder, SocketStreamBuilder},
    error::{BuildError, OpenError},
    file::{FileSink, FileSinkFactory},
    reporter::SharedReporter,
    sink::{Sink, SinkFactory},
    socket::{ActiveConnection, ResolutionPolicy, SocketSinkFactory},
    stream::ResilientStream,
};

/// TLS section of a [`SocketStreamConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Domain presented during the handshake; defaults to the host.
    pub domain: Option<String>,
    pub insecure: bool,
}

/// Socket stream settings.
///
/// Set either `host` and `port` (TCP) or `path` (Unix domain socket).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SocketStreamConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<PathBuf>,
    pub tls: Option<TlsConfig>,
    pub connect_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub resolution: ResolutionPolicy,
    pub backoff: BackoffOverrides,
    pub status_limit: Option<u32>,
    pub warn_interval_ms: Option<u64>,
}

impl SocketStreamConfig {
    /// Translate into a builder. Validation beyond transport selection is
    /// left to the builder.
    pub fn into_builder(self) -> Result<SocketStreamBuilder, BuildError> {
        let mut builder = match (self.host, self.port, self.path) {
            (Some(host), Some(port), None) => SocketStreamBuilder::new().with_tcp(host, port),
            (Some(_), None, None) => {
                return Err(BuildError::InvalidConfig(
                    "tcp transport requires a port".into(),
                ));
            }
            (None, Some(_), None) => {
                return Err(BuildError::InvalidConfig(
                    "tcp transport requires a host".into(),
                ));
            }
            (None, None, Some(path)) => SocketStreamBuilder::new().with_unix_path(path),
            (None, None, None) => SocketStreamBuilder::new(),
            _ => {
                return Err(BuildError::InvalidConfig(
                    "set either host and port or path, not both".into(),
                ));
            }
        };
        if let Some(tls) = self.tls {
            builder = builder.with_tls(tls.domain, tls.insecure);
        }
        if let Some(timeout) = self.connect_timeout_ms {
            builder = builder.with_connect_timeout_ms(timeout);
        }
        if let Some(timeout) = self.write_timeout_ms {
            builder = builder.with_write_timeout_ms(timeout);
        }
        if let Some(limit) = self.status_limit {
            builder = builder.with_status_limit(limit);
        }
        if let Some(interval) = self.warn_interval_ms {
            builder = builder.with_warn_interval_ms(interval);
        }
        Ok(builder
            .with_resolution_policy(self.resolution)
            .with_backoff(self.backoff))
    }
}

fn default_append() -> bool {
    true
}

/// File stream settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FileStreamConfig {
    pub path: PathBuf,
    #[serde(default = "default_append")]
    pub append: bool,
    #[serde(default)]
    pub create_dirs: bool,
    #[serde(default)]
    pub backoff: BackoffOverrides,
    #[serde(default)]
    pub status_limit: Option<u32>,
    #[serde(default)]
    pub warn_interval_ms: Option<u64>,
}

impl FileStreamConfig {
    pub fn into_builder(self) -> FileStreamBuilder {
        let mut builder = FileStreamBuilder::new(self.path)
            .with_append(self.append)
            .with_create_dirs(self.create_dirs)
            .with_backoff(self.backoff);
        if let Some(limit) = self.status_limit {
            builder = builder.with_status_limit(limit);
        }
        if let Some(interval) = self.warn_interval_ms {
            builder = builder.with_warn_interval_ms(interval);
        }
        builder
    }
}

/// Any supported stream, selected by the `kind` field.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamConfig {
    Socket(SocketStreamConfig),
    File(FileStreamConfig),
}

/// Stream over whichever sink a [`StreamConfig`] selected.
pub type AnyStream = ResilientStream<AnySinkFactory>;

impl StreamConfig {
    /// Build an unopened stream, reporting to `reporter` when given and to
    /// the `log` facade otherwise.
    pub fn build(self, reporter: Option<SharedReporter>) -> Result<AnyStream, BuildError> {
        let (factory, options, reporter) = match self {
            StreamConfig::Socket(config) => {
                let mut builder = config.into_builder()?;
                if let Some(reporter) = reporter {
                    builder = builder.with_reporter(reporter);
                }
                let (factory, options, reporter) = builder.build_parts()?;
                (AnySinkFactory::Socket(factory), options, reporter)
            }
            StreamConfig::File(config) => {
                let mut builder = config.into_builder();
                if let Some(reporter) = reporter {
                    builder = builder.with_reporter(reporter);
                }
                let (factory, options, reporter) = builder.build_parts()?;
                (AnySinkFactory::File(factory), options, reporter)
            }
        };
        Ok(ResilientStream::with_options(factory, reporter, options))
    }

    /// Build the stream and perform the initial open.
    pub fn connect(self, reporter: Option<SharedReporter>) -> Result<AnyStream, BuildError> {
        let stream = self.build(reporter)?;
        stream.open()?;
        Ok(stream)
    }
}

/// Factory chosen at runtime from configuration.
#[derive(Debug)]
pub enum AnySinkFactory {
    Socket(SocketSinkFactory),
    File(FileSinkFactory),
}

/// Sink produced by [`AnySinkFactory`].
#[derive(Debug)]
pub enum AnySink {
    Socket(ActiveConnection),
    File(FileSink),
}

impl SinkFactory for AnySinkFactory {
    type Sink = AnySink;

    fn open_sink(&mut self) -> Result<AnySink, OpenError> {
        match self {
            AnySinkFactory::Socket(factory) => factory.open_sink().map(AnySink::Socket),
            AnySinkFactory::File(factory) => factory.open_sink().map(AnySink::File),
        }
    }

    fn describe(&self) -> String {
        match self {
            AnySinkFactory::Socket(factory) => factory.describe(),
            AnySinkFactory::File(factory) => factory.describe(),
        }
    }
}

impl Sink for AnySink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            AnySink::Socket(sink) => sink.write_all(buf),
            AnySink::File(sink) => sink.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            AnySink::Socket(sink) => sink.flush(),
            AnySink::File(sink) => sink.flush(),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self {
            AnySink::Socket(sink) => sink.close(),
            AnySink::File(sink) => sink.close(),
        }
    }
}
