//! Socket specialisation of the resilient stream.
//!
//! [`SocketSinkFactory`] resolves the configured host, connects with a bounded
//! timeout and hands the stream a brand-new connection on every call. TCP
//! (optionally wrapped in TLS) and Unix domain sockets are supported.

mod factory;
mod transport;


pub use factory::{ResolutionPolicy, SocketSinkFactory};
pub use transport::{ActiveConnection, SocketTransport, TcpTransport, TlsOptions, UnixTransport};

use std::time::Duration;

/// Default connection timeout applied when establishing sockets.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default write timeout applied to socket writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
