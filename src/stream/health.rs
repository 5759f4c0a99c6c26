//! Health bookkeeping owned by a [`ResilientStream`](super::ResilientStream).

use std::time::{Duration, Instant};

/// Lifecycle state of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Constructed but `open()` has not succeeded yet.
    Uninitialized,
    /// A sink is installed and writes go straight to it.
    Healthy,
    /// The last sink failed; writes are dropped until a recovery succeeds.
    Unhealthy,
    /// Terminal.
    Closed,
}

/// Failure counters. `consecutive_failures == 0` exactly when `is_healthy`.
#[derive(Debug)]
pub(crate) struct HealthState {
    is_healthy: bool,
    consecutive_failures: u64,
    last_failure_time: Option<Instant>,
    last_recovery_attempt_time: Option<Instant>,
    recovery_attempts: u64,
    dropped_writes: u64,
    on_probation: bool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            is_healthy: true,
            consecutive_failures: 0,
            last_failure_time: None,
            last_recovery_attempt_time: None,
            recovery_attempts: 0,
            dropped_writes: 0,
            on_probation: false,
        }
    }
}

impl HealthState {
    pub(crate) fn record_failure(&mut self, now: Instant) {
        self.is_healthy = false;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_time = Some(now);
    }

    pub(crate) fn record_attempt(&mut self, now: Instant) {
        self.last_recovery_attempt_time = Some(now);
        self.recovery_attempts = self.recovery_attempts.saturating_add(1);
    }

    pub(crate) fn record_drop(&mut self) {
        self.dropped_writes = self.dropped_writes.saturating_add(1);
    }

    /// Mark the stream healthy again and return the writes lost during the
    /// episode that just ended.
    pub(crate) fn record_recovery(&mut self) -> u64 {
        self.is_healthy = true;
        self.consecutive_failures = 0;
        self.on_probation = true;
        std::mem::take(&mut self.dropped_writes)
    }

    /// Clear the probation flag, returning whether it was set.
    pub(crate) fn confirm_success(&mut self) -> bool {
        std::mem::take(&mut self.on_probation)
    }

    pub(crate) fn snapshot(&self, state: StreamState, current_backoff: Duration) -> HealthSnapshot {
        HealthSnapshot {
            state,
            is_healthy: self.is_healthy,
            consecutive_failures: self.consecutive_failures,
            last_failure_time: self.last_failure_time,
            last_recovery_attempt_time: self.last_recovery_attempt_time,
            recovery_attempts: self.recovery_attempts,
            dropped_writes: self.dropped_writes,
            current_backoff,
        }
    }
}

/// Read-only copy of a stream's health at one point in time.
///
/// `is_healthy` tracks whether the sink is presumed clean; it starts `true`
/// and is only cleared by a failure. Use `state` to tell an unopened or
/// closed stream apart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub state: StreamState,
    pub is_healthy: bool,
    pub consecutive_failures: u64,
    pub last_failure_time: Option<Instant>,
    pub last_recovery_attempt_time: Option<Instant>,
    /// Recovery attempts over the lifetime of the stream.
    pub recovery_attempts: u64,
    /// Writes lost in the current failure episode.
    pub dropped_writes: u64,
    /// Interval the backoff gate currently applies.
    pub current_backoff: Duration,
}
