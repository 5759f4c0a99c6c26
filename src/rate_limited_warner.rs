//! Coalesces repeated diagnostics into periodic summaries.

use std::time::{Duration, Instant};

/// Default interval between summary warnings.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Counts suppressed events and lets the caller emit a summary at most once
/// per interval.
///
/// The caller increments the counter via [`record`](Self::record). The next
/// call to [`warn_if_due`](Self::warn_if_due) invokes the callback with the
/// pending count if the interval has elapsed. [`flush`](Self::flush) emits
/// immediately if anything is pending. The first summary is never delayed.
///
/// Not synchronised: streams keep it inside their critical section.
#[derive(Debug)]
pub struct RateLimitedWarner {
    interval: Duration,
    last_warn: Option<Instant>,
    pending: u64,
}

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL)
    }
}

impl RateLimitedWarner {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_warn: None,
            pending: 0,
        }
    }

    /// Increment the pending counter.
    pub fn record(&mut self) {
        self.pending = self.pending.saturating_add(1);
    }

    /// Number of events recorded since the last summary.
    #[cfg(test)]
    pub fn pending(&self) -> u64 {
        self.pending
    }

    /// Emit a summary if the interval has elapsed since the previous one.
    pub fn warn_if_due(&mut self, now: Instant, warn: impl FnOnce(u64)) {
        if self.pending == 0 {
            return;
        }
        let due = self
            .last_warn
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            warn(std::mem::take(&mut self.pending));
            self.last_warn = Some(now);
        }
    }

    /// Immediately emit a summary for any pending events.
    pub fn flush(&mut self, now: Instant, warn: impl FnOnce(u64)) {
        if self.pending > 0 {
            warn(std::mem::take(&mut self.pending));
            self.last_warn = Some(now);
        }
    }

    /// Start a fresh interval at `now` without emitting anything.
    pub fn mark_warned(&mut self, now: Instant) {
        self.last_warn = Some(now);
    }

    /// Forget pending events and the last emission time.
    pub fn reset(&mut self) {
        self.pending = 0;
        self.last_warn = None;
    }
}
