//! Settings shared by every stream builder.

use std::time::Duration;

use serde::Deserialize;

use crate::{
    error::BuildError,
    reporter::{SharedReporter, default_reporter},
    stream::{BackoffPolicy, StreamOptions},
};

use super::builder_macros::ensure_positive;

/// Overrides for the recovery backoff applied by a stream.
///
/// Unset fields keep the defaults from [`BackoffPolicy::default`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffOverrides {
    initial_ms: Option<u64>,
    multiplier: Option<u32>,
    cap_ms: Option<u64>,
    jitter: Option<bool>,
}

impl BackoffOverrides {
    /// Create overrides with no custom values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the delay before the first recovery attempt.
    pub fn with_initial_ms(mut self, initial_ms: u64) -> Self {
        self.initial_ms = Some(initial_ms);
        self
    }

    /// Override the growth factor. A multiplier of one keeps the delay fixed.
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Override the upper bound on the delay.
    pub fn with_cap_ms(mut self, cap_ms: u64) -> Self {
        self.cap_ms = Some(cap_ms);
        self
    }

    /// Add up to a quarter of the interval as random extra delay.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub(crate) fn apply(&self, policy: &mut BackoffPolicy) -> Result<(), BuildError> {
        if let Some(initial) = self.initial_ms {
            ensure_positive!(initial, "backoff_initial_ms")?;
            policy.initial = Duration::from_millis(initial);
        }
        if let Some(multiplier) = self.multiplier {
            ensure_positive!(multiplier, "backoff_multiplier")?;
            policy.multiplier = multiplier;
        }
        if let Some(cap) = self.cap_ms {
            ensure_positive!(cap, "backoff_cap_ms")?;
            policy.cap = Duration::from_millis(cap);
        }
        if let Some(jitter) = self.jitter {
            policy.jitter = jitter;
        }
        if policy.cap < policy.initial {
            return Err(BuildError::InvalidConfig(format!(
                "backoff_cap_ms ({}) must not be below backoff_initial_ms ({})",
                policy.cap.as_millis(),
                policy.initial.as_millis()
            )));
        }
        Ok(())
    }
}

/// Recovery tuning and reporter shared by the socket and file builders.
#[derive(Clone, Default)]
pub(crate) struct StreamSettings {
    pub(crate) backoff: BackoffOverrides,
    pub(crate) status_limit: Option<u32>,
    pub(crate) warn_interval_ms: Option<u64>,
    pub(crate) reporter: Option<SharedReporter>,
}

impl StreamSettings {
    pub(crate) fn options(&self) -> Result<StreamOptions, BuildError> {
        let mut options = StreamOptions::default();
        self.backoff.apply(&mut options.backoff)?;
        if let Some(limit) = self.status_limit {
            options.status_limit = ensure_positive!(limit, "status_limit")?;
        }
        if let Some(interval) = self.warn_interval_ms {
            ensure_positive!(interval, "warn_interval_ms")?;
            options.warn_interval = Duration::from_millis(interval);
        }
        Ok(options)
    }

    pub(crate) fn reporter(&self) -> SharedReporter {
        self.reporter.clone().unwrap_or_else(default_reporter)
    }
}

impl std::fmt::Debug for StreamSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSettings")
            .field("backoff", &self.backoff)
            .field("status_limit", &self.status_limit)
            .field("warn_interval_ms", &self.warn_interval_ms)
            .field("custom_reporter", &self.reporter.is_some())
            .finish()
    }
}
