//! Error types surfaced by sink factories and builders.
//!
//! Only [`OpenError`] ever reaches a caller of the stream itself, and only
//! from the initial [`ResilientStream::open`](crate::ResilientStream::open).
//! Every later failure is absorbed and reported instead.

use std::io;

use thiserror::Error;

/// Failure to acquire a fresh sink.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The configured host name did not resolve to any address.
    #[error("could not resolve [{host}]")]
    ResolutionFailed {
        host: String,
        #[source]
        source: io::Error,
    },
    /// Transport-level connect failure (refused, unreachable, timed out or a
    /// failed TLS handshake).
    #[error("could not connect to {target}")]
    ConnectFailed {
        target: String,
        #[source]
        source: io::Error,
    },
    /// Local I/O failure while opening a non-network sink.
    #[error("could not open {target}")]
    Io {
        target: String,
        #[source]
        source: io::Error,
    },
    /// `open()` was called on a stream that already holds a sink.
    #[error("stream is already open")]
    AlreadyOpen,
    /// `open()` was called after `close()`.
    #[error("stream has been closed")]
    Closed,
}

impl OpenError {
    /// Underlying I/O error, when one exists.
    pub fn io_source(&self) -> Option<&io::Error> {
        match self {
            OpenError::ResolutionFailed { source, .. }
            | OpenError::ConnectFailed { source, .. }
            | OpenError::Io { source, .. } => Some(source),
            OpenError::AlreadyOpen | OpenError::Closed => None,
        }
    }
}

/// Errors that may occur while building a stream.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid stream configuration: {0}")]
    InvalidConfig(String),
    /// The stream was built but its initial open failed.
    #[error(transparent)]
    Open(#[from] OpenError),
}
