//! Output streams that survive transient sink failures.
//!
//! A [`ResilientStream`] writes bytes to a sink obtained from a
//! [`SinkFactory`]. When the sink breaks, the stream reports the failure
//! once, drops writes while a backoff interval runs and then reopens the
//! sink from inside a later write. Callers never see write errors; only the
//! initial [`open`](ResilientStream::open) can fail.
//!
//! Socket (TCP, TLS and Unix domain) and file factories ship with the crate.
//! Streams are assembled through [`SocketStreamBuilder`], [`FileStreamBuilder`]
//! or a deserialised [`StreamConfig`](config::StreamConfig).

pub mod builders;
mod clock;
pub mod config;
pub mod error;
pub mod file;
mod rate_limited_warner;
pub mod reporter;
pub mod resolver;
pub mod sink;
pub mod socket;
pub mod stream;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use builders::{
    BackoffOverrides, FileStream, FileStreamBuilder, SocketStream, SocketStreamBuilder,
};
pub use clock::{TimeProvider, system_time_provider};
pub use error::{BuildError, OpenError};
pub use file::{FileSink, FileSinkFactory};
pub use rate_limited_warner::DEFAULT_WARN_INTERVAL;
#[cfg(feature = "tracing")]
pub use reporter::TracingReporter;
pub use reporter::{
    ErrorReporter, LogReporter, NopReporter, SharedReporter, Severity, Status, StatusRecorder,
    render_cause,
};
pub use resolver::{Resolve, SharedResolver, StaticResolver, SystemResolver};
pub use sink::{Sink, SinkFactory, WriterSink};
pub use socket::{ResolutionPolicy, SocketSinkFactory, SocketTransport};
pub use stream::{
    BackoffPolicy, DEFAULT_STATUS_LIMIT, HealthSnapshot, ResilientStream, StreamOptions,
    StreamState,
};
