//! Diagnostics channel of resilient streams.
//!
//! Streams never return write-time errors to their callers. Everything that
//! goes wrong below the public boundary is turned into a report handed to an
//! [`ErrorReporter`]. Implementations must not panic and must not block for an
//! unbounded amount of time.

use std::{collections::VecDeque, error::Error, fmt, sync::Arc};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use parking_lot::Mutex;

/// Target used for every record emitted by [`LogReporter`].
pub const LOG_TARGET: &str = "resilient_stream";

/// Default number of statuses retained by [`StatusRecorder`].
pub const DEFAULT_STATUS_CAPACITY: usize = 150;

/// Importance of a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for non-fatal diagnostics.
pub trait ErrorReporter: Send + Sync {
    /// Surface `message`, optionally caused by `cause`.
    fn report(&self, severity: Severity, message: &str, cause: Option<&(dyn Error + 'static)>);
}

/// Reference-counted reporter handle injected into streams.
pub type SharedReporter = Arc<dyn ErrorReporter>;

impl<R: ErrorReporter + ?Sized> ErrorReporter for Arc<R> {
    fn report(&self, severity: Severity, message: &str, cause: Option<&(dyn Error + 'static)>) {
        (**self).report(severity, message, cause);
    }
}

/// Render `cause` and every error in its `source()` chain, joined by ": ".
pub fn render_cause(cause: &(dyn Error + 'static)) -> String {
    let mut rendered = cause.to_string();
    for source in std::iter::successors(cause.source(), |&err| err.source()) {
        rendered.push_str(": ");
        rendered.push_str(&source.to_string());
    }
    rendered
}

/// Reporter used when none is configured.
pub fn default_reporter() -> SharedReporter {
    Arc::new(LogReporter)
}

/// Forwards reports to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, severity: Severity, message: &str, cause: Option<&(dyn Error + 'static)>) {
        match (severity, cause.map(render_cause)) {
            (Severity::Info, None) => info!(target: LOG_TARGET, "{message}"),
            (Severity::Info, Some(cause)) => info!(target: LOG_TARGET, "{message}: {cause}"),
            (Severity::Warn, None) => warn!(target: LOG_TARGET, "{message}"),
            (Severity::Warn, Some(cause)) => warn!(target: LOG_TARGET, "{message}: {cause}"),
            (Severity::Error, None) => error!(target: LOG_TARGET, "{message}"),
            (Severity::Error, Some(cause)) => error!(target: LOG_TARGET, "{message}: {cause}"),
        }
    }
}

/// Forwards reports to `tracing` as events with a structured `cause` field.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

#[cfg(feature = "tracing")]
impl ErrorReporter for TracingReporter {
    fn report(&self, severity: Severity, message: &str, cause: Option<&(dyn Error + 'static)>) {
        let cause = cause.map(render_cause);
        match severity {
            Severity::Info => tracing::info!(target: LOG_TARGET, cause = ?cause, "{message}"),
            Severity::Warn => tracing::warn!(target: LOG_TARGET, cause = ?cause, "{message}"),
            Severity::Error => tracing::error!(target: LOG_TARGET, cause = ?cause, "{message}"),
        }
    }
}

/// Discards every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopReporter;

impl ErrorReporter for NopReporter {
    fn report(&self, _: Severity, _: &str, _: Option<&(dyn Error + 'static)>) {}
}

/// A single report captured by [`StatusRecorder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub severity: Severity,
    pub message: String,
    pub cause: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Keeps the most recent reports in memory.
///
/// Once `capacity` statuses are held the oldest one is evicted, so a
/// long-running outage cannot grow the recorder without bound.
#[derive(Debug)]
pub struct StatusRecorder {
    statuses: Mutex<VecDeque<Status>>,
    capacity: usize,
}

impl Default for StatusRecorder {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STATUS_CAPACITY)
    }
}

impl StatusRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder retaining at most `capacity` statuses.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            statuses: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_STATUS_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of the retained statuses, oldest first.
    pub fn statuses(&self) -> Vec<Status> {
        self.statuses.lock().iter().cloned().collect()
    }

    /// Number of retained statuses with the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.statuses
            .lock()
            .iter()
            .filter(|status| status.severity == severity)
            .count()
    }

    /// Messages of the retained statuses, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.statuses
            .lock()
            .iter()
            .map(|status| status.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.statuses.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.lock().is_empty()
    }

    pub fn clear(&self) {
        self.statuses.lock().clear();
    }
}

impl ErrorReporter for StatusRecorder {
    fn report(&self, severity: Severity, message: &str, cause: Option<&(dyn Error + 'static)>) {
        let status = Status {
            severity,
            message: message.to_owned(),
            cause: cause.map(render_cause),
            timestamp: Utc::now(),
        };
        let mut statuses = self.statuses.lock();
        if statuses.len() == self.capacity {
            statuses.pop_front();
        }
        statuses.push_back(status);
    }
}
