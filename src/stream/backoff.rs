//! Backoff gate deciding when a broken stream may try to recover.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Default delay before the first recovery attempt.
pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_millis(20);
/// Default growth factor applied after every recovery attempt.
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 4;
/// Default upper bound on the recovery interval.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_millis(327_680);

/// Minimum spacing between recovery attempts.
///
/// The first attempt becomes eligible `initial` after the failure. Each
/// attempt multiplies the interval by `multiplier`, up to `cap`. A multiplier
/// of one keeps the interval fixed. With `jitter` enabled a random extra of up
/// to a quarter of the interval is added, so jitter never shortens the wait.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: u32,
    pub cap: Duration,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: DEFAULT_BACKOFF_INITIAL,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            cap: DEFAULT_BACKOFF_CAP,
            jitter: false,
        }
    }
}

impl BackoffPolicy {
    /// Policy that waits exactly `interval` between attempts.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial: interval,
            multiplier: 1,
            cap: interval,
            jitter: false,
        }
    }
}

/// Tracks the current interval and the earliest instant of the next attempt.
pub(crate) struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
    next_attempt: Option<Instant>,
    rng: StdRng,
}

impl BackoffState {
    pub(crate) fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.initial,
            next_attempt: None,
            rng: StdRng::from_entropy(),
            policy,
        }
    }

    /// Open the gate window after a failure observed at `now`.
    pub(crate) fn start(&mut self, now: Instant) {
        if self.next_attempt.is_none() {
            let delay = self.delay();
            self.next_attempt = Some(now + delay);
        }
    }

    /// Whether an attempt at `now` would come too early.
    pub(crate) fn is_too_soon(&self, now: Instant) -> bool {
        self.next_attempt.is_some_and(|next| now < next)
    }

    /// Consume the current window: grow the interval and schedule the next
    /// eligible attempt relative to `now`.
    pub(crate) fn begin_attempt(&mut self, now: Instant) {
        self.current = self
            .current
            .saturating_mul(self.policy.multiplier.max(1))
            .min(self.policy.cap.max(self.policy.initial));
        let delay = self.delay();
        self.next_attempt = Some(now + delay);
    }

    /// Close the window after a successful recovery while keeping the grown
    /// interval. A failure before the next successful write starts from there.
    pub(crate) fn settle(&mut self) {
        self.next_attempt = None;
    }

    /// Return to the initial interval.
    pub(crate) fn reset(&mut self) {
        self.current = self.policy.initial;
        self.next_attempt = None;
    }

    pub(crate) fn current_interval(&self) -> Duration {
        self.current
    }

    #[cfg(test)]
    pub(crate) fn next_attempt(&self) -> Option<Instant> {
        self.next_attempt
    }

    fn delay(&mut self) -> Duration {
        if !self.policy.jitter {
            return self.current;
        }
        let max_extra = (self.current.as_millis() / 4).min(u128::from(u64::MAX)) as u64;
        if max_extra == 0 {
            return self.current;
        }
        self.current + Duration::from_millis(self.rng.gen_range(0..=max_extra))
    }
}
