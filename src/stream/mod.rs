//! Resilient output stream.
//!
//! [`ResilientStream`] owns exactly one sink at a time. Writes go straight to
//! that sink while it works. The first failure closes it, marks the stream
//! unhealthy and is reported. While unhealthy, writes are dropped until the
//! backoff gate opens; the next write then asks the [`SinkFactory`] for a
//! replacement and, if that succeeds, delivers its own bytes to the new sink.
//!
//! Only the initial [`open`](ResilientStream::open) can fail observably.
//! Every later failure becomes a report on the injected
//! [`ErrorReporter`](crate::reporter::ErrorReporter) plus a state transition.
//!
//! There are no background threads. Recovery runs inline on the writing
//! thread, so factories must bound their own blocking (the socket factory
//! applies a connect timeout).

mod backoff;
mod health;
mod throttle;

#[cfg(test)]
mod tests;

use std::{
    fmt,
    io::{self, Write},
    mem,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::{
    clock::{TimeProvider, system_time_provider},
    error::OpenError,
    rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner},
    reporter::{SharedReporter, Severity},
    resolver::unresolved_message,
    sink::{Sink, SinkFactory},
};

pub use backoff::{
    BackoffPolicy, DEFAULT_BACKOFF_CAP, DEFAULT_BACKOFF_INITIAL, DEFAULT_BACKOFF_MULTIPLIER,
};
pub use health::{HealthSnapshot, StreamState};
pub use throttle::DEFAULT_STATUS_LIMIT;

use backoff::BackoffState;
use health::HealthState;
use throttle::ReportThrottle;

/// Tunables for a [`ResilientStream`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamOptions {
    pub backoff: BackoffPolicy,
    /// Reports emitted per failure episode before suppression kicks in.
    pub status_limit: u32,
    /// Minimum spacing of summaries for suppressed reports and for writes
    /// dropped while the stream is not open.
    pub warn_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            status_limit: DEFAULT_STATUS_LIMIT,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

enum Slot<S> {
    Uninitialized,
    Healthy(S),
    Unhealthy,
    Closed,
}

impl<S> Slot<S> {
    fn state(&self) -> StreamState {
        match self {
            Slot::Uninitialized => StreamState::Uninitialized,
            Slot::Healthy(_) => StreamState::Healthy,
            Slot::Unhealthy => StreamState::Unhealthy,
            Slot::Closed => StreamState::Closed,
        }
    }
}

struct Inner<F: SinkFactory> {
    factory: F,
    slot: Slot<F::Sink>,
    health: HealthState,
    backoff: BackoffState,
    throttle: ReportThrottle,
    idle_drops: RateLimitedWarner,
    reporter: SharedReporter,
    clock: TimeProvider,
    description: String,
}

/// Output stream that survives sink failures by reopening the sink.
pub struct ResilientStream<F: SinkFactory> {
    inner: Mutex<Inner<F>>,
    description: String,
}

impl<F: SinkFactory> ResilientStream<F> {
    /// Create an unopened stream with default options.
    pub fn new(factory: F, reporter: SharedReporter) -> Self {
        Self::with_options(factory, reporter, StreamOptions::default())
    }

    /// Create an unopened stream.
    pub fn with_options(factory: F, reporter: SharedReporter, options: StreamOptions) -> Self {
        let description = factory.describe();
        let inner = Inner {
            factory,
            slot: Slot::Uninitialized,
            health: HealthState::default(),
            backoff: BackoffState::new(options.backoff),
            throttle: ReportThrottle::new(options.status_limit, options.warn_interval),
            idle_drops: RateLimitedWarner::new(options.warn_interval),
            reporter,
            clock: system_time_provider(),
            description: description.clone(),
        };
        Self {
            inner: Mutex::new(inner),
            description,
        }
    }

    /// Replace the clock used for backoff and warning intervals.
    pub fn with_time_provider(mut self, clock: TimeProvider) -> Self {
        self.inner.get_mut().clock = clock;
        self
    }

    /// Acquire the first sink.
    ///
    /// Unlike every later failure, a failed initial open is returned to the
    /// caller, which decides whether it is fatal. The stream stays
    /// uninitialised and `open()` may be retried. A host that does not
    /// resolve is also reported.
    pub fn open(&self) -> Result<(), OpenError> {
        let mut inner = self.inner.lock();
        match inner.slot {
            Slot::Uninitialized => {}
            Slot::Closed => return Err(OpenError::Closed),
            Slot::Healthy(_) | Slot::Unhealthy => return Err(OpenError::AlreadyOpen),
        }
        match inner.factory.open_sink() {
            Ok(sink) => {
                inner.slot = Slot::Healthy(sink);
                Ok(())
            }
            Err(err) => {
                if let OpenError::ResolutionFailed { host, source } = &err {
                    inner
                        .reporter
                        .report(Severity::Error, &unresolved_message(host), Some(source));
                }
                Err(err)
            }
        }
    }

    /// Write `buf` to the current sink. Never fails; bytes that cannot be
    /// delivered are dropped.
    pub fn write(&self, buf: &[u8]) {
        self.inner.lock().write(buf);
    }

    /// Flush the current sink if the stream is healthy.
    pub fn flush(&self) {
        self.inner.lock().flush();
    }

    /// Release the current sink. Idempotent and terminal.
    pub fn close(&self) {
        self.inner.lock().close();
    }

    /// Diagnostic identity of the sink, available before any open.
    pub fn describe(&self) -> &str {
        &self.description
    }

    /// Whether writes currently reach an open sink.
    pub fn is_healthy(&self) -> bool {
        self.state() == StreamState::Healthy
    }

    pub fn state(&self) -> StreamState {
        self.inner.lock().slot.state()
    }

    pub fn health(&self) -> HealthSnapshot {
        let inner = self.inner.lock();
        inner
            .health
            .snapshot(inner.slot.state(), inner.backoff.current_interval())
    }

    /// Run `f` with shared access to the factory, e.g. to inspect the last
    /// resolved address of a socket factory.
    ///
    /// The stream's lock is held while `f` runs and is not reentrant: calling
    /// back into this stream from `f` deadlocks.
    pub fn with_factory<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        f(&self.inner.lock().factory)
    }
}

impl<F: SinkFactory> Inner<F> {
    fn write(&mut self, buf: &[u8]) {
        let now = (self.clock)();
        match self.slot {
            Slot::Uninitialized | Slot::Closed => {
                self.record_idle_drop(now);
                return;
            }
            Slot::Unhealthy => {
                if self.backoff.is_too_soon(now) || !self.attempt_recovery(now) {
                    self.health.record_drop();
                    return;
                }
            }
            Slot::Healthy(_) => {}
        }
        let Slot::Healthy(sink) = &mut self.slot else {
            return;
        };
        match sink.write_all(buf) {
            Ok(()) => self.confirm_success(),
            Err(err) => {
                self.health.record_drop();
                self.fail(now, "IO failure while writing to", err);
            }
        }
    }

    fn flush(&mut self) {
        let Slot::Healthy(sink) = &mut self.slot else {
            return;
        };
        match sink.flush() {
            Ok(()) => self.confirm_success(),
            Err(err) => {
                let now = (self.clock)();
                self.fail(now, "IO failure while flushing", err);
            }
        }
    }

    fn close(&mut self) {
        let now = (self.clock)();
        match mem::replace(&mut self.slot, Slot::Closed) {
            Slot::Healthy(mut sink) => {
                if let Err(err) = sink.close() {
                    self.reporter.report(
                        Severity::Warn,
                        &format!("Failed to close {}", self.description),
                        Some(&err),
                    );
                }
            }
            Slot::Unhealthy => {
                self.throttle
                    .end_episode(&*self.reporter, &self.description, now);
            }
            Slot::Uninitialized | Slot::Closed => {}
        }
        let (reporter, description) = (&self.reporter, &self.description);
        self.idle_drops.flush(now, |count| {
            reporter.report(
                Severity::Warn,
                &format!("{count} writes to {description} dropped while the stream was not open"),
                None,
            );
        });
    }

    /// Close the broken sink and enter a new failure episode.
    fn fail(&mut self, now: Instant, context: &str, err: io::Error) {
        if let Slot::Healthy(mut sink) = mem::replace(&mut self.slot, Slot::Unhealthy) {
            // The sink is already broken; a close failure adds nothing.
            let _ = sink.close();
        }
        self.health.record_failure(now);
        self.backoff.start(now);
        self.throttle.report(
            &*self.reporter,
            &self.description,
            now,
            Severity::Error,
            &format!("{context} {}", self.description),
            Some(&err),
        );
    }

    fn attempt_recovery(&mut self, now: Instant) -> bool {
        self.backoff.begin_attempt(now);
        self.health.record_attempt(now);
        self.throttle.report(
            &*self.reporter,
            &self.description,
            now,
            Severity::Info,
            &format!("Attempting to recover from IO failure on {}", self.description),
            None,
        );
        match self.factory.open_sink() {
            Ok(sink) => {
                self.slot = Slot::Healthy(sink);
                let dropped = self.health.record_recovery();
                self.backoff.settle();
                self.throttle
                    .end_episode(&*self.reporter, &self.description, now);
                let message = match dropped {
                    0 => format!("Recovered from IO failure on {}", self.description),
                    n => format!(
                        "Recovered from IO failure on {} after dropping {n} writes",
                        self.description
                    ),
                };
                self.reporter.report(Severity::Info, &message, None);
                true
            }
            Err(err) => {
                self.health.record_failure(now);
                let message = match &err {
                    OpenError::ResolutionFailed { host, .. } => unresolved_message(host),
                    _ => format!("Failed to open {}", self.description),
                };
                self.throttle.report(
                    &*self.reporter,
                    &self.description,
                    now,
                    Severity::Error,
                    &message,
                    Some(&err),
                );
                false
            }
        }
    }

    fn confirm_success(&mut self) {
        if self.health.confirm_success() {
            self.backoff.reset();
        }
    }

    fn record_idle_drop(&mut self, now: Instant) {
        self.idle_drops.record();
        let (reporter, description) = (&self.reporter, &self.description);
        self.idle_drops.warn_if_due(now, |count| {
            reporter.report(
                Severity::Warn,
                &format!("{count} writes to {description} dropped while the stream was not open"),
                None,
            );
        });
    }
}

impl<F: SinkFactory> Write for ResilientStream<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.get_mut().write(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.get_mut().flush();
        Ok(())
    }
}

impl<F: SinkFactory> Write for &ResilientStream<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush();
        Ok(())
    }
}

impl<F: SinkFactory> Drop for ResilientStream<F> {
    fn drop(&mut self) {
        self.inner.get_mut().close();
    }
}

impl<F: SinkFactory> fmt::Debug for ResilientStream<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientStream")
            .field("description", &self.description)
            .field("state", &self.state())
            .finish()
    }
}
