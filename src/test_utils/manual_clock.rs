//! Hand-driven time source for backoff tests.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::clock::TimeProvider;

/// Clock that only moves when told to.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn now(&self) -> Instant {
        *self.now.lock()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Time provider reading this clock, for
    /// [`ResilientStream::with_time_provider`](crate::ResilientStream::with_time_provider).
    pub fn provider(&self) -> TimeProvider {
        let now = Arc::clone(&self.now);
        Box::new(move || *now.lock())
    }
}
