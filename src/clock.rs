//! Time source used by streams for backoff and warning intervals.

use std::time::Instant;

/// Returns the current instant. Injected so tests can drive time by hand.
pub type TimeProvider = Box<dyn Fn() -> Instant + Send + Sync>;

/// Time provider backed by the monotonic system clock.
pub fn system_time_provider() -> TimeProvider {
    Box::new(Instant::now)
}
